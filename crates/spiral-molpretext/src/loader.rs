//! Batched, parallel retrieval of jigsaw samples.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use spiral_config::determinism::{sample_rng, sample_seed};

use crate::dataset::SmilesSource;
use crate::jigsaw::{JigsawDataset, JigsawSample};
use crate::{PretextError, Result};

/// Groups dataset rows into batches and builds each batch with rayon.
///
/// Every sample draws from its own generator seeded from
/// `(seed, epoch, index)`, so a batch is identical however the work is
/// scheduled across threads.
pub struct JigsawLoader<'a, S: SmilesSource> {
    dataset: &'a JigsawDataset<S>,
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    seed: u64,
}

impl<'a, S: SmilesSource> JigsawLoader<'a, S> {
    pub fn new(dataset: &'a JigsawDataset<S>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(PretextError::InvalidArgument(
                "batch size must be >= 1".to_string(),
            ));
        }
        Ok(Self {
            dataset,
            batch_size,
            shuffle: false,
            drop_last: false,
            seed: spiral_config::determinism::config().seed_for("jigsaw-loader"),
        })
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Drops a trailing batch shorter than the batch size.
    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_batches(&self) -> usize {
        let len = self.dataset.len();
        if self.drop_last {
            len / self.batch_size
        } else {
            len.div_ceil(self.batch_size)
        }
    }

    /// Row order visited during `epoch`.
    pub fn indices(&self, epoch: u64) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            let mut rng = StdRng::seed_from_u64(sample_seed(self.seed, epoch, u64::MAX));
            indices.shuffle(&mut rng);
        }
        indices
    }

    /// Builds the samples for `indices` in parallel, preserving their order.
    pub fn load_batch(&self, epoch: u64, indices: &[usize]) -> Result<Vec<JigsawSample>> {
        indices
            .par_iter()
            .map(|&index| {
                let mut rng = sample_rng(self.seed, epoch, index as u64);
                self.dataset.get_item(index, &mut rng)
            })
            .collect()
    }

    /// Iterates the batches of one epoch.
    pub fn epoch(&self, epoch: u64) -> EpochBatches<'_, 'a, S> {
        EpochBatches {
            loader: self,
            epoch,
            indices: self.indices(epoch),
            cursor: 0,
        }
    }
}

/// Batches of a single epoch, yielded in order.
pub struct EpochBatches<'l, 'a, S: SmilesSource> {
    loader: &'l JigsawLoader<'a, S>,
    epoch: u64,
    indices: Vec<usize>,
    cursor: usize,
}

impl<S: SmilesSource> Iterator for EpochBatches<'_, '_, S> {
    type Item = Result<Vec<JigsawSample>>;

    fn next(&mut self) -> Option<Self::Item> {
        let remaining = self.indices.len().saturating_sub(self.cursor);
        if remaining == 0 || (self.loader.drop_last && remaining < self.loader.batch_size) {
            return None;
        }
        let take = remaining.min(self.loader.batch_size);
        let batch = &self.indices[self.cursor..self.cursor + take];
        self.cursor += take;
        Some(self.loader.load_batch(self.epoch, batch))
    }
}
