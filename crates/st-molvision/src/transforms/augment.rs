// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Pixel-space augmentation applied to the rendered depiction before tiling.

use image::{imageops, Rgb, RgbImage};
use rand::{Rng, RngCore};

use super::check_probability;
use crate::VisionResult;

/// Image-to-image transform run on freshly rendered depictions.
pub trait ImageTransform: Send + Sync {
    fn apply(&self, image: RgbImage, rng: &mut dyn RngCore) -> RgbImage;
}

impl<F> ImageTransform for F
where
    F: Fn(RgbImage, &mut dyn RngCore) -> RgbImage + Send + Sync,
{
    fn apply(&self, image: RgbImage, rng: &mut dyn RngCore) -> RgbImage {
        self(image, rng)
    }
}

/// Random geometric / photometric operation on an RGB depiction. Each variant
/// fires with its own probability.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ImageAugmentation {
    HorizontalFlip { p: f32 },
    VerticalFlip { p: f32 },
    /// Quarter-turn clockwise. Only meaningful for square images.
    Rotate90 { p: f32 },
    /// Luma replicated into all three channels.
    Grayscale { p: f32 },
}

impl ImageAugmentation {
    pub fn horizontal_flip(p: f32) -> VisionResult<Self> {
        check_probability("horizontal_flip", p)?;
        Ok(Self::HorizontalFlip { p })
    }

    pub fn vertical_flip(p: f32) -> VisionResult<Self> {
        check_probability("vertical_flip", p)?;
        Ok(Self::VerticalFlip { p })
    }

    pub fn rotate90(p: f32) -> VisionResult<Self> {
        check_probability("rotate90", p)?;
        Ok(Self::Rotate90 { p })
    }

    pub fn grayscale(p: f32) -> VisionResult<Self> {
        check_probability("grayscale", p)?;
        Ok(Self::Grayscale { p })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::HorizontalFlip { .. } => "HorizontalFlip",
            Self::VerticalFlip { .. } => "VerticalFlip",
            Self::Rotate90 { .. } => "Rotate90",
            Self::Grayscale { .. } => "Grayscale",
        }
    }

    fn probability(&self) -> f32 {
        match *self {
            Self::HorizontalFlip { p }
            | Self::VerticalFlip { p }
            | Self::Rotate90 { p }
            | Self::Grayscale { p } => p,
        }
    }

    fn run(&self, mut image: RgbImage, rng: &mut dyn RngCore) -> RgbImage {
        if rng.gen::<f32>() >= self.probability() {
            return image;
        }
        match self {
            Self::HorizontalFlip { .. } => {
                imageops::flip_horizontal_in_place(&mut image);
                image
            }
            Self::VerticalFlip { .. } => {
                imageops::flip_vertical_in_place(&mut image);
                image
            }
            Self::Rotate90 { .. } => imageops::rotate90(&image),
            Self::Grayscale { .. } => {
                for pixel in image.pixels_mut() {
                    let [r, g, b] = pixel.0;
                    let luma = 0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b);
                    let v = luma.round().clamp(0.0, 255.0) as u8;
                    *pixel = Rgb([v, v, v]);
                }
                image
            }
        }
    }
}

/// Ordered list of [`ImageAugmentation`] stages.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImagePipeline {
    operations: Vec<ImageAugmentation>,
}

impl ImagePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, op: ImageAugmentation) -> &mut Self {
        self.operations.push(op);
        self
    }

    pub fn operations(&self) -> &[ImageAugmentation] {
        &self.operations
    }
}

impl ImageTransform for ImagePipeline {
    fn apply(&self, image: RgbImage, rng: &mut dyn RngCore) -> RgbImage {
        self.operations
            .iter()
            .fold(image, |image, op| op.run(image, &mut *rng))
    }
}
