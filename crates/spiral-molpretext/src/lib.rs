//! Pretext sample construction for self-supervised molecular image learning.
//!
//! Every dataset row (a SMILES string) is rendered to a depiction and turned
//! into a [`JigsawSample`]: a tile-shuffled composite with its permutation
//! class, plus unshuffled full-size and 64x64 views and their masked
//! counterparts for reconstruction.

pub mod config;
pub mod dataset;
pub mod jigsaw;
pub mod loader;
pub mod masks;
pub mod permutations;
pub mod render;

use std::path::PathBuf;

use st_molvision::VisionError;
use thiserror::Error;

pub use config::{JigsawConfig, MaskConfig};
pub use dataset::{train_val_split, MoleculeFrame, SmilesSource};
pub use jigsaw::{JigsawDataset, JigsawSample};
pub use loader::JigsawLoader;
pub use masks::{MaskSpec, MaskStrategy, MaskType};
pub use permutations::{CatalogError, Permutation, PermutationCatalog};
pub use render::{ManifestRenderer, MoleculeRenderer, RenderResult};

/// Errors surfaced while loading datasets or building pretext samples.
#[derive(Debug, Error)]
pub enum PretextError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Vision(#[from] VisionError),
    /// Raised when a row index exceeds the dataset length.
    #[error("row {index} out of range for a dataset of {len} rows")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("dataset error: {0}")]
    Dataset(String),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Raised when an invalid parameter (ratio, split size, etc.) is provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, PretextError>;
