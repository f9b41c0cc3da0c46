//! Molecule depiction sources.
//!
//! Rendering SMILES to pixels belongs to an external chemistry toolkit. The
//! builder only sees a [`MoleculeRenderer`], whose outcome is an explicit
//! [`RenderResult`] so the fallback policy stays visible at the call site.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use image::RgbImage;
use serde::Deserialize;
use st_molvision::resize;

use crate::{PretextError, Result};

/// Edge length of rendered depictions.
pub const RENDER_EDGE: u32 = 224;

/// Outcome of rendering one SMILES string.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderResult {
    Rendered(RgbImage),
    Failed(String),
}

/// Turns a SMILES string into an RGB depiction.
pub trait MoleculeRenderer: Send + Sync {
    fn render(&self, smiles: &str) -> RenderResult;
}

impl<F> MoleculeRenderer for F
where
    F: Fn(&str) -> RenderResult + Send + Sync,
{
    fn render(&self, smiles: &str) -> RenderResult {
        self(smiles)
    }
}

#[derive(Debug, Deserialize)]
struct ManifestRow {
    smiles: String,
    image: PathBuf,
}

/// Serves depictions pre-rendered by an external toolkit.
///
/// The manifest is a CSV with `smiles` and `image` columns; relative image
/// paths are resolved against the manifest's directory. Images are decoded
/// lazily and resized to [`RENDER_EDGE`] when needed.
#[derive(Clone, Debug, Default)]
pub struct ManifestRenderer {
    entries: HashMap<String, PathBuf>,
    edge: u32,
}

impl ManifestRenderer {
    pub fn from_entries<I, S, P>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(smiles, path)| (smiles.into(), path.into()))
                .collect(),
            edge: RENDER_EDGE,
        }
    }

    pub fn from_manifest(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| PretextError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut reader = csv::Reader::from_reader(file);
        let mut entries = HashMap::new();
        for row in reader.deserialize::<ManifestRow>() {
            let row = row?;
            let image = if row.image.is_absolute() {
                row.image
            } else {
                base.join(row.image)
            };
            entries.insert(row.smiles, image);
        }
        Ok(Self {
            entries,
            edge: RENDER_EDGE,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MoleculeRenderer for ManifestRenderer {
    fn render(&self, smiles: &str) -> RenderResult {
        let Some(path) = self.entries.get(smiles) else {
            return RenderResult::Failed("no depiction registered for this SMILES".to_string());
        };
        match image::open(path) {
            Ok(decoded) => {
                RenderResult::Rendered(resize(&decoded.to_rgb8(), self.edge, self.edge))
            }
            Err(err) => RenderResult::Failed(format!("{}: {err}", path.display())),
        }
    }
}
