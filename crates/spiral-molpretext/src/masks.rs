//! Occlusion masks for the reconstruction view.
//!
//! Masked pixels are replaced per channel by the mean of that channel over
//! the unmasked image, so occlusions carry no colour bias.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use rand::distributions::{Bernoulli, Distribution};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use st_molvision::{channel_mean, ImageTensor, VisionError};

use crate::{PretextError, Result};

/// Mask family configured for a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskType {
    /// Every pixel is masked independently with probability `ratio`.
    RandomMask,
    /// One rectangle of fixed size at a random position.
    RectangleMask,
    /// A fair coin picks one of the two strategies per sample.
    MixMask,
}

impl MaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaskType::RandomMask => "random_mask",
            MaskType::RectangleMask => "rectangle_mask",
            MaskType::MixMask => "mix_mask",
        }
    }
}

impl fmt::Display for MaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MaskType {
    type Err = PretextError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random_mask" => Ok(MaskType::RandomMask),
            "rectangle_mask" => Ok(MaskType::RectangleMask),
            "mix_mask" => Ok(MaskType::MixMask),
            other => Err(PretextError::InvalidArgument(format!(
                "unknown mask type `{other}` (expected random_mask, rectangle_mask or mix_mask)"
            ))),
        }
    }
}

/// Concrete generator used for one mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskStrategy {
    Random,
    Rectangle,
}

/// Mask parameters shared by both resolutions of a sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaskSpec {
    pub mask_type: MaskType,
    pub ratio: f64,
    pub shape_h: usize,
    pub shape_w: usize,
}

impl MaskSpec {
    pub fn new(mask_type: MaskType, ratio: f64, shape_h: usize, shape_w: usize) -> Result<Self> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(PretextError::InvalidArgument(format!(
                "mask ratio must lie in [0, 1], got {ratio}"
            )));
        }
        if shape_h == 0 || shape_w == 0 {
            return Err(PretextError::InvalidArgument(format!(
                "mask shape must be > 0, got {shape_h}x{shape_w}"
            )));
        }
        Ok(Self {
            mask_type,
            ratio,
            shape_h,
            shape_w,
        })
    }

    /// Draws one mask for an `height x width` image.
    pub fn generate(
        &self,
        strategy: MaskStrategy,
        height: usize,
        width: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Array2<bool>> {
        match strategy {
            MaskStrategy::Random => random_mask(height, width, self.ratio, rng),
            MaskStrategy::Rectangle => Ok(rectangle_mask(
                height,
                width,
                self.shape_h,
                self.shape_w,
                rng,
            )),
        }
    }

    /// Masks the full-size and thumbnail views.
    ///
    /// `random_mask` and `rectangle_mask` draw one mask per resolution.
    /// `mix_mask` flips a single coin per call and both resolutions use the
    /// strategy it picked; each still receives a mask of its own shape.
    pub fn build_masks(
        &self,
        full: &ImageTensor,
        thumbnail: &ImageTensor,
        rng: &mut dyn RngCore,
    ) -> Result<(ImageTensor, ImageTensor)> {
        let strategy = match self.mask_type {
            MaskType::RandomMask => MaskStrategy::Random,
            MaskType::RectangleMask => MaskStrategy::Rectangle,
            MaskType::MixMask => {
                if rng.gen::<f64>() > 0.5 {
                    MaskStrategy::Random
                } else {
                    MaskStrategy::Rectangle
                }
            }
        };
        let full_mask = self.generate(strategy, full.height(), full.width(), rng)?;
        let thumb_mask = self.generate(strategy, thumbnail.height(), thumbnail.width(), rng)?;
        Ok((
            apply_mask(full, &full_mask)?,
            apply_mask(thumbnail, &thumb_mask)?,
        ))
    }
}

/// Bernoulli(`ratio`) mask.
pub fn random_mask(
    height: usize,
    width: usize,
    ratio: f64,
    rng: &mut dyn RngCore,
) -> Result<Array2<bool>> {
    let coin = Bernoulli::new(ratio).map_err(|err| {
        PretextError::InvalidArgument(format!("mask ratio {ratio} rejected: {err}"))
    })?;
    Ok(Array2::from_shape_simple_fn((height, width), || {
        coin.sample(&mut *rng)
    }))
}

/// Single `shape_h x shape_w` rectangle placed uniformly inside the image.
/// Rectangles larger than the image are clamped to it.
pub fn rectangle_mask(
    height: usize,
    width: usize,
    shape_h: usize,
    shape_w: usize,
    rng: &mut dyn RngCore,
) -> Array2<bool> {
    let mut mask = Array2::from_elem((height, width), false);
    let rect_h = shape_h.min(height);
    let rect_w = shape_w.min(width);
    if rect_h == 0 || rect_w == 0 {
        return mask;
    }
    let top = rng.gen_range(0..=height - rect_h);
    let left = rng.gen_range(0..=width - rect_w);
    mask.slice_mut(ndarray::s![top..top + rect_h, left..left + rect_w])
        .fill(true);
    mask
}

/// Replaces masked pixels with the pre-mask mean of their channel.
pub fn apply_mask(image: &ImageTensor, mask: &Array2<bool>) -> Result<ImageTensor> {
    let (channels, height, width) = image.shape();
    if mask.dim() != (height, width) {
        let (mask_h, mask_w) = mask.dim();
        return Err(VisionError::ShapeMismatch {
            left: (channels, height, width),
            right: (1, mask_h, mask_w),
        }
        .into());
    }
    let mut masked = image.clone();
    for channel in 0..channels {
        let fill = channel_mean(image, channel)?;
        for (value, &hit) in masked.channel_mut(channel)?.iter_mut().zip(mask.iter()) {
            if hit {
                *value = fill;
            }
        }
    }
    Ok(masked)
}
