use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::masks::{MaskSpec, MaskType};
use crate::{PretextError, Result};

/// Occlusion settings for the reconstruction view.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MaskConfig {
    #[serde(default = "MaskConfig::default_mask_type")]
    pub mask_type: MaskType,
    #[serde(default = "MaskConfig::default_ratio")]
    pub mask_ratio: f64,
    #[serde(default = "MaskConfig::default_shape")]
    pub mask_shape_h: usize,
    #[serde(default = "MaskConfig::default_shape")]
    pub mask_shape_w: usize,
}

impl MaskConfig {
    fn default_mask_type() -> MaskType {
        MaskType::RectangleMask
    }

    fn default_ratio() -> f64 {
        0.25
    }

    fn default_shape() -> usize {
        16
    }

    pub fn spec(&self) -> Result<MaskSpec> {
        MaskSpec::new(
            self.mask_type,
            self.mask_ratio,
            self.mask_shape_h,
            self.mask_shape_w,
        )
    }
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            mask_type: Self::default_mask_type(),
            mask_ratio: Self::default_ratio(),
            mask_shape_h: Self::default_shape(),
            mask_shape_w: Self::default_shape(),
        }
    }
}

/// Dataset-level settings for [`crate::JigsawDataset`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct JigsawConfig {
    #[serde(default = "JigsawConfig::default_jig_classes")]
    pub jig_classes: usize,
    /// Probability of forcing the identity class; absent or zero disables it.
    #[serde(default)]
    pub bias_whole_image: Option<f64>,
    #[serde(default = "JigsawConfig::default_permutations_dir")]
    pub permutations_dir: PathBuf,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub mask: MaskConfig,
}

impl Default for JigsawConfig {
    fn default() -> Self {
        Self {
            jig_classes: Self::default_jig_classes(),
            bias_whole_image: None,
            permutations_dir: Self::default_permutations_dir(),
            seed: None,
            mask: MaskConfig::default(),
        }
    }
}

impl JigsawConfig {
    fn default_jig_classes() -> usize {
        100
    }

    fn default_permutations_dir() -> PathBuf {
        PathBuf::from(".")
    }

    pub fn validate(&self) -> Result<()> {
        if self.jig_classes == 0 {
            return Err(PretextError::InvalidArgument(
                "jig_classes must be >= 1".to_string(),
            ));
        }
        if let Some(bias) = self.bias_whole_image {
            if !(0.0..=1.0).contains(&bias) {
                return Err(PretextError::InvalidArgument(format!(
                    "bias_whole_image must lie in [0, 1], got {bias}"
                )));
            }
        }
        self.mask.spec().map(|_| ())
    }

    pub fn from_toml_str(config: &str) -> Result<Self> {
        let parsed: JigsawConfig = toml::from_str(config).map_err(|err| {
            PretextError::InvalidArgument(format!("failed to parse jigsaw config: {err}"))
        })?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(&path).map_err(|source| PretextError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&data)
    }
}
