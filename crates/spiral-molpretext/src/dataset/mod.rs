use std::fs::File;
use std::io::Read;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{PretextError, Result};

/// Row-indexed access to SMILES strings.
pub trait SmilesSource: Send + Sync {
    fn len(&self) -> usize;

    fn smiles(&self, index: usize) -> Option<&str>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SmilesSource for Vec<String> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn smiles(&self, index: usize) -> Option<&str> {
        self.get(index).map(String::as_str)
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct SmilesRow {
    smiles: String,
}

/// In-memory molecule table keeping the `smiles` column of a CSV file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MoleculeFrame {
    smiles: Vec<String>,
}

impl MoleculeFrame {
    pub fn from_smiles<I, S>(smiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            smiles: smiles.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads a headed CSV; columns other than `smiles` are ignored.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        if !reader.headers()?.iter().any(|h| h.trim() == "smiles") {
            return Err(PretextError::Dataset(
                "CSV has no `smiles` column".to_string(),
            ));
        }
        let smiles = reader
            .deserialize::<SmilesRow>()
            .map(|row| row.map(|r| r.smiles))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { smiles })
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| PretextError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    /// Writes a single-column `smiles` CSV.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        for smiles in &self.smiles {
            writer.serialize(SmilesRow {
                smiles: smiles.clone(),
            })?;
        }
        writer.flush().map_err(|source| PretextError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })
    }

    pub fn rows(&self) -> &[String] {
        &self.smiles
    }

    pub fn len(&self) -> usize {
        self.smiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.smiles.is_empty()
    }
}

impl SmilesSource for MoleculeFrame {
    fn len(&self) -> usize {
        self.smiles.len()
    }

    fn smiles(&self, index: usize) -> Option<&str> {
        self.smiles.get(index).map(String::as_str)
    }
}

/// Shuffles `frame` and carves off `ceil(val_size * n)` validation rows.
pub fn train_val_split<R: Rng>(
    frame: &MoleculeFrame,
    val_size: f64,
    rng: &mut R,
) -> Result<(MoleculeFrame, MoleculeFrame)> {
    if !(0.0..=1.0).contains(&val_size) {
        return Err(PretextError::InvalidArgument(format!(
            "validation size must lie in [0, 1], got {val_size}"
        )));
    }
    let mut rows = frame.smiles.clone();
    rows.shuffle(rng);
    let val_len = ((val_size * rows.len() as f64).ceil() as usize).min(rows.len());
    let train = rows.split_off(val_len);
    Ok((
        MoleculeFrame { smiles: train },
        MoleculeFrame { smiles: rows },
    ))
}
