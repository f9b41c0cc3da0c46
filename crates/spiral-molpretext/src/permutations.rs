//! Precomputed tile permutations for the jigsaw task.
//!
//! Tables live in `permutations_{N}.npy` files where `N` is the configured
//! class count. Class 0 is the identity and is never stored, so a table for
//! `N` classes holds `N - 1` rows of nine tile indices.

use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView2, Axis};
use ndarray_npy::read_npy;
use thiserror::Error;
use tracing::info;

/// Number of tiles in a 3x3 jigsaw grid.
pub const TILE_COUNT: usize = 9;

/// Row-major tile order: position `t` of the composite shows tile `p[t]`.
pub type Permutation = [usize; TILE_COUNT];

/// Errors raised while loading or validating a permutation table.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    #[error("jigsaw class count must be at least 1")]
    ZeroClasses,
    #[error("no permutation table for {class_count} classes at {}", path.display())]
    NotFound { class_count: usize, path: PathBuf },
    #[error("failed to read permutation table {}: {message}", path.display())]
    Read { path: PathBuf, message: String },
    #[error("permutation table has {columns} columns, expected 9")]
    Columns { columns: usize },
    #[error("permutation table has {rows} rows, expected {expected} for {class_count} classes")]
    ClassCount {
        class_count: usize,
        rows: usize,
        expected: usize,
    },
    #[error("permutation row {row} is not a bijection on 0..9: {values:?}")]
    InvalidRow { row: usize, values: Vec<i64> },
}

/// Immutable, validated permutation table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermutationCatalog {
    class_count: usize,
    permutations: Vec<Permutation>,
}

impl PermutationCatalog {
    /// File name used for a given class count.
    pub fn table_name(class_count: usize) -> String {
        format!("permutations_{class_count}.npy")
    }

    /// Full path of the table for `class_count` inside `dir`.
    pub fn table_path(dir: impl AsRef<Path>, class_count: usize) -> PathBuf {
        dir.as_ref().join(Self::table_name(class_count))
    }

    /// Loads the table for `class_count` from the working directory.
    pub fn load(class_count: usize) -> Result<Self, CatalogError> {
        Self::load_from_dir(".", class_count)
    }

    /// Loads the table for `class_count` from `dir`.
    pub fn load_from_dir(dir: impl AsRef<Path>, class_count: usize) -> Result<Self, CatalogError> {
        if class_count == 0 {
            return Err(CatalogError::ZeroClasses);
        }
        let path = Self::table_path(dir, class_count);
        if !path.is_file() {
            return Err(CatalogError::NotFound { class_count, path });
        }
        let table = read_table(&path)?;
        let catalog = Self::from_table(table.view(), class_count)?;
        info!(
            path = %path.display(),
            class_count,
            permutations = catalog.len(),
            "loaded jigsaw permutation table"
        );
        Ok(catalog)
    }

    /// Validates a raw table, shifting 1-based tables down to 0-based.
    pub fn from_table(table: ArrayView2<'_, i64>, class_count: usize) -> Result<Self, CatalogError> {
        if class_count == 0 {
            return Err(CatalogError::ZeroClasses);
        }
        let (rows, columns) = table.dim();
        if columns != TILE_COUNT {
            return Err(CatalogError::Columns { columns });
        }
        let expected = class_count - 1;
        if rows != expected {
            return Err(CatalogError::ClassCount {
                class_count,
                rows,
                expected,
            });
        }
        let offset = match table.iter().min() {
            Some(&1) => 1,
            _ => 0,
        };
        let permutations = table
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(row, values)| {
                let shifted: Vec<i64> = values.iter().map(|v| v - offset).collect();
                to_permutation(&shifted).ok_or_else(|| CatalogError::InvalidRow {
                    row,
                    values: values.to_vec(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            class_count,
            permutations,
        })
    }

    /// Builds a catalog directly from 0-based permutations.
    pub fn from_permutations(permutations: Vec<Permutation>) -> Result<Self, CatalogError> {
        for (row, permutation) in permutations.iter().enumerate() {
            let values: Vec<i64> = permutation.iter().map(|&v| v as i64).collect();
            if to_permutation(&values).is_none() {
                return Err(CatalogError::InvalidRow { row, values });
            }
        }
        Ok(Self {
            class_count: permutations.len() + 1,
            permutations,
        })
    }

    /// Configured class count, identity included.
    pub fn class_count(&self) -> usize {
        self.class_count
    }

    /// Number of stored (non-identity) permutations.
    pub fn len(&self) -> usize {
        self.permutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permutations.is_empty()
    }

    pub fn permutations(&self) -> &[Permutation] {
        &self.permutations
    }

    /// Permutation applied for a class label; `None` for class 0 or labels
    /// beyond the table.
    pub fn for_class(&self, class: usize) -> Option<&Permutation> {
        class.checked_sub(1).and_then(|i| self.permutations.get(i))
    }
}

fn to_permutation(values: &[i64]) -> Option<Permutation> {
    if values.len() != TILE_COUNT {
        return None;
    }
    let mut seen = [false; TILE_COUNT];
    let mut out = [0usize; TILE_COUNT];
    for (slot, &value) in out.iter_mut().zip(values) {
        let idx = usize::try_from(value).ok().filter(|&v| v < TILE_COUNT)?;
        if std::mem::replace(&mut seen[idx], true) {
            return None;
        }
        *slot = idx;
    }
    Some(out)
}

/// Reads a 2D table stored with any common integer dtype, or as integral
/// floats.
fn read_table(path: &Path) -> Result<Array2<i64>, CatalogError> {
    let first = match read_npy::<_, Array2<i64>>(path) {
        Ok(table) => return Ok(table),
        Err(err) => err.to_string(),
    };
    if let Ok(table) = read_npy::<_, Array2<i32>>(path) {
        return Ok(table.mapv(i64::from));
    }
    if let Ok(table) = read_npy::<_, Array2<i16>>(path) {
        return Ok(table.mapv(i64::from));
    }
    if let Ok(table) = read_npy::<_, Array2<u8>>(path) {
        return Ok(table.mapv(i64::from));
    }
    if let Ok(table) = read_npy::<_, Array2<f64>>(path) {
        if table.iter().all(|v| v.fract() == 0.0 && v.is_finite()) {
            return Ok(table.mapv(|v| v as i64));
        }
        return Err(CatalogError::Read {
            path: path.to_path_buf(),
            message: "floating point table contains non-integral entries".to_string(),
        });
    }
    Err(CatalogError::Read {
        path: path.to_path_buf(),
        message: first,
    })
}
