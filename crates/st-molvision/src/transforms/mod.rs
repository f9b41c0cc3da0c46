// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Tensor-level transforms.
//!
//! Pipelines are stateless: every stochastic operation draws from the
//! generator handed to [`TransformPipeline::apply`], so one pipeline can be
//! shared by concurrent sample builders.

pub mod augment;

use image::RgbImage;
use rand::{Rng, RngCore};

use crate::{ImageTensor, VisionError, VisionResult};

/// Something that rewrites an [`ImageTensor`] in place.
pub trait TensorTransform: Send + Sync {
    fn apply(&self, image: &mut ImageTensor, rng: &mut dyn RngCore) -> VisionResult<()>;
}

impl<F> TensorTransform for F
where
    F: Fn(&mut ImageTensor, &mut dyn RngCore) -> VisionResult<()> + Send + Sync,
{
    fn apply(&self, image: &mut ImageTensor, rng: &mut dyn RngCore) -> VisionResult<()> {
        self(image, rng)
    }
}

/// Converts an RGB depiction (tile composite or full view) into a tensor,
/// applying any augmentation on the way.
pub trait TileTransform: Send + Sync {
    fn apply(&self, image: &RgbImage, rng: &mut dyn RngCore) -> VisionResult<ImageTensor>;
}

impl<F> TileTransform for F
where
    F: Fn(&RgbImage, &mut dyn RngCore) -> VisionResult<ImageTensor> + Send + Sync,
{
    fn apply(&self, image: &RgbImage, rng: &mut dyn RngCore) -> VisionResult<ImageTensor> {
        self(image, rng)
    }
}

/// `[0, 255]` to `[0, 1]` conversion followed by an optional tensor pipeline.
#[derive(Clone, Debug, Default)]
pub struct ToTensor {
    pipeline: TransformPipeline,
}

impl ToTensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pipeline(pipeline: TransformPipeline) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &TransformPipeline {
        &self.pipeline
    }
}

impl TileTransform for ToTensor {
    fn apply(&self, image: &RgbImage, rng: &mut dyn RngCore) -> VisionResult<ImageTensor> {
        let mut tensor = ImageTensor::from_rgb_image(image);
        self.pipeline.apply(&mut tensor, rng)?;
        Ok(tensor)
    }
}

/// Per-channel `(x - mean) / std`. A single statistic broadcasts over all
/// channels.
#[derive(Clone, Debug, PartialEq)]
pub struct Normalize {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Normalize {
    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> VisionResult<Self> {
        if mean.is_empty() || mean.len() != std.len() {
            return Err(VisionError::InvalidParameter {
                label: "normalize",
                message: format!(
                    "mean ({}) and std ({}) must be non-empty and equally long",
                    mean.len(),
                    std.len()
                ),
            });
        }
        if let Some(bad) = std.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(VisionError::InvalidParameter {
                label: "normalize",
                message: format!("std must be positive, got {bad}"),
            });
        }
        Ok(Self { mean, std })
    }

    /// ImageNet statistics, the usual choice for pretrained backbones.
    pub fn imagenet() -> Self {
        Self {
            mean: vec![0.485, 0.456, 0.406],
            std: vec![0.229, 0.224, 0.225],
        }
    }

    fn run(&self, image: &mut ImageTensor) -> VisionResult<()> {
        let channels = image.channels();
        if self.mean.len() != 1 && self.mean.len() != channels {
            return Err(VisionError::InvalidParameter {
                label: "normalize",
                message: format!(
                    "{} statistics for a {channels}-channel image",
                    self.mean.len()
                ),
            });
        }
        for channel in 0..channels {
            let idx = if self.mean.len() == 1 { 0 } else { channel };
            let (mean, std) = (self.mean[idx], self.std[idx]);
            for value in image.channel_mut(channel)? {
                *value = (*value - mean) / std;
            }
        }
        Ok(())
    }
}

impl TensorTransform for Normalize {
    fn apply(&self, image: &mut ImageTensor, _rng: &mut dyn RngCore) -> VisionResult<()> {
        self.run(image)
    }
}

/// Bilinear resize with half-pixel centres.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resize {
    height: usize,
    width: usize,
}

impl Resize {
    pub fn new(height: usize, width: usize) -> VisionResult<Self> {
        if height == 0 || width == 0 {
            return Err(VisionError::InvalidParameter {
                label: "resize",
                message: format!("target size must be > 0, got {height}x{width}"),
            });
        }
        Ok(Self { height, width })
    }

    fn run(&self, image: &mut ImageTensor) -> VisionResult<()> {
        let (channels, src_h, src_w) = image.shape();
        if (src_h, src_w) == (self.height, self.width) {
            return Ok(());
        }
        let scale_y = src_h as f32 / self.height as f32;
        let scale_x = src_w as f32 / self.width as f32;
        let mut out = Vec::with_capacity(channels * self.height * self.width);
        for channel in 0..channels {
            let plane = image.channel(channel)?;
            for y in 0..self.height {
                let sy = ((y as f32 + 0.5) * scale_y - 0.5).clamp(0.0, (src_h - 1) as f32);
                let y0 = sy.floor() as usize;
                let y1 = (y0 + 1).min(src_h - 1);
                let fy = sy - y0 as f32;
                for x in 0..self.width {
                    let sx = ((x as f32 + 0.5) * scale_x - 0.5).clamp(0.0, (src_w - 1) as f32);
                    let x0 = sx.floor() as usize;
                    let x1 = (x0 + 1).min(src_w - 1);
                    let fx = sx - x0 as f32;
                    let top = plane[y0 * src_w + x0] * (1.0 - fx) + plane[y0 * src_w + x1] * fx;
                    let bottom = plane[y1 * src_w + x0] * (1.0 - fx) + plane[y1 * src_w + x1] * fx;
                    out.push(top * (1.0 - fy) + bottom * fy);
                }
            }
        }
        *image = ImageTensor::new(channels, self.height, self.width, out)?;
        Ok(())
    }
}

/// Crops the centre `height x width` window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CenterCrop {
    height: usize,
    width: usize,
}

impl CenterCrop {
    pub fn new(height: usize, width: usize) -> VisionResult<Self> {
        if height == 0 || width == 0 {
            return Err(VisionError::InvalidParameter {
                label: "center_crop",
                message: format!("crop size must be > 0, got {height}x{width}"),
            });
        }
        Ok(Self { height, width })
    }

    fn run(&self, image: &mut ImageTensor) -> VisionResult<()> {
        let (channels, src_h, src_w) = image.shape();
        if self.height > src_h || self.width > src_w {
            return Err(VisionError::ShapeMismatch {
                left: (channels, src_h, src_w),
                right: (channels, self.height, self.width),
            });
        }
        let top = (src_h - self.height) / 2;
        let left = (src_w - self.width) / 2;
        let mut out = Vec::with_capacity(channels * self.height * self.width);
        for channel in 0..channels {
            let plane = image.channel(channel)?;
            for y in top..top + self.height {
                out.extend_from_slice(&plane[y * src_w + left..y * src_w + left + self.width]);
            }
        }
        *image = ImageTensor::new(channels, self.height, self.width, out)?;
        Ok(())
    }
}

/// Mirrors the image left-right with probability `p`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RandomHorizontalFlip {
    p: f32,
}

impl RandomHorizontalFlip {
    pub fn new(p: f32) -> VisionResult<Self> {
        check_probability("random_horizontal_flip", p)?;
        Ok(Self { p })
    }

    fn run(&self, image: &mut ImageTensor, rng: &mut dyn RngCore) -> VisionResult<()> {
        if rng.gen::<f32>() >= self.p {
            return Ok(());
        }
        let width = image.width();
        for channel in 0..image.channels() {
            for row in image.channel_mut(channel)?.chunks_exact_mut(width) {
                row.reverse();
            }
        }
        Ok(())
    }
}

/// Random brightness, contrast and saturation scaling. Each factor is drawn
/// from `[max(0, 1 - s), 1 + s]`; a strength of zero disables that stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorJitter {
    brightness: f32,
    contrast: f32,
    saturation: f32,
}

impl ColorJitter {
    pub fn new(brightness: f32, contrast: f32, saturation: f32) -> VisionResult<Self> {
        for (label, value) in [
            ("brightness", brightness),
            ("contrast", contrast),
            ("saturation", saturation),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(VisionError::InvalidParameter {
                    label: "color_jitter",
                    message: format!("{label} must be >= 0, got {value}"),
                });
            }
        }
        Ok(Self {
            brightness,
            contrast,
            saturation,
        })
    }

    fn factor(strength: f32, rng: &mut dyn RngCore) -> Option<f32> {
        if strength == 0.0 {
            return None;
        }
        let low = (1.0 - strength).max(0.0);
        Some(rng.gen_range(low..=1.0 + strength))
    }

    fn run(&self, image: &mut ImageTensor, rng: &mut dyn RngCore) -> VisionResult<()> {
        if let Some(factor) = Self::factor(self.brightness, rng) {
            for value in image.as_mut_slice() {
                *value = (*value * factor).clamp(0.0, 1.0);
            }
        }
        if let Some(factor) = Self::factor(self.contrast, rng) {
            let gray = grayscale_plane(image)?;
            let mean = gray.iter().sum::<f32>() / gray.len() as f32;
            for value in image.as_mut_slice() {
                *value = (mean + (*value - mean) * factor).clamp(0.0, 1.0);
            }
        }
        if let Some(factor) = Self::factor(self.saturation, rng) {
            let gray = grayscale_plane(image)?;
            for channel in 0..image.channels() {
                for (value, g) in image.channel_mut(channel)?.iter_mut().zip(&gray) {
                    *value = (g + (*value - g) * factor).clamp(0.0, 1.0);
                }
            }
        }
        Ok(())
    }
}

fn grayscale_plane(image: &ImageTensor) -> VisionResult<Vec<f32>> {
    if image.channels() != 3 {
        return Err(VisionError::ChannelCount {
            expected: 3,
            got: image.channels(),
        });
    }
    let (r, g, b) = (image.channel(0)?, image.channel(1)?, image.channel(2)?);
    Ok(r.iter()
        .zip(g)
        .zip(b)
        .map(|((r, g), b)| 0.299 * r + 0.587 * g + 0.114 * b)
        .collect())
}

pub(crate) fn check_probability(label: &'static str, p: f32) -> VisionResult<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(VisionError::InvalidParameter {
            label,
            message: format!("probability must lie in [0, 1], got {p}"),
        });
    }
    Ok(())
}

/// One stage of a [`TransformPipeline`].
#[derive(Clone, Debug, PartialEq)]
pub enum TransformOperation {
    Normalize(Normalize),
    Resize(Resize),
    CenterCrop(CenterCrop),
    RandomHorizontalFlip(RandomHorizontalFlip),
    ColorJitter(ColorJitter),
}

impl TransformOperation {
    pub fn name(&self) -> &'static str {
        match self {
            TransformOperation::Normalize(_) => "Normalize",
            TransformOperation::Resize(_) => "Resize",
            TransformOperation::CenterCrop(_) => "CenterCrop",
            TransformOperation::RandomHorizontalFlip(_) => "RandomHorizontalFlip",
            TransformOperation::ColorJitter(_) => "ColorJitter",
        }
    }

    pub fn apply(&self, image: &mut ImageTensor, rng: &mut dyn RngCore) -> VisionResult<()> {
        match self {
            TransformOperation::Normalize(op) => op.run(image),
            TransformOperation::Resize(op) => op.run(image),
            TransformOperation::CenterCrop(op) => op.run(image),
            TransformOperation::RandomHorizontalFlip(op) => op.run(image, rng),
            TransformOperation::ColorJitter(op) => op.run(image, rng),
        }
    }
}

/// Ordered list of tensor operations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransformPipeline {
    operations: Vec<TransformOperation>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, op: TransformOperation) -> &mut Self {
        self.operations.push(op);
        self
    }

    pub fn operations(&self) -> &[TransformOperation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn apply(&self, image: &mut ImageTensor, rng: &mut dyn RngCore) -> VisionResult<()> {
        for op in &self.operations {
            op.apply(image, rng)?;
        }
        Ok(())
    }
}

impl TensorTransform for TransformPipeline {
    fn apply(&self, image: &mut ImageTensor, rng: &mut dyn RngCore) -> VisionResult<()> {
        TransformPipeline::apply(self, image, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ramp(channels: usize, height: usize, width: usize) -> ImageTensor {
        let len = channels * height * width;
        let data = (0..len).map(|v| v as f32 / len as f32).collect();
        ImageTensor::new(channels, height, width, data).unwrap()
    }

    #[test]
    fn normalize_broadcasts_single_statistic() {
        let mut image = ImageTensor::new(2, 1, 1, vec![0.5, 1.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let op = Normalize::new(vec![0.5], vec![0.5]).unwrap();
        TensorTransform::apply(&op, &mut image, &mut rng).unwrap();
        assert_eq!(image.as_slice(), &[0.0, 1.0]);
        assert!(Normalize::new(vec![0.5], vec![0.0]).is_err());
    }

    #[test]
    fn resize_preserves_constant_images() {
        let mut image = ImageTensor::new(3, 4, 4, vec![0.25; 48]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        TransformOperation::Resize(Resize::new(7, 3).unwrap())
            .apply(&mut image, &mut rng)
            .unwrap();
        assert_eq!(image.shape(), (3, 7, 3));
        assert!(image.as_slice().iter().all(|v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn center_crop_takes_middle_window() {
        let mut image = ramp(1, 4, 4);
        let mut rng = StdRng::seed_from_u64(0);
        TransformOperation::CenterCrop(CenterCrop::new(2, 2).unwrap())
            .apply(&mut image, &mut rng)
            .unwrap();
        let expected: Vec<f32> = [5.0, 6.0, 9.0, 10.0].iter().map(|v| v / 16.0).collect();
        assert_eq!(image.as_slice(), expected.as_slice());
    }

    #[test]
    fn certain_flip_mirrors_rows() {
        let mut image = ImageTensor::new(1, 1, 3, vec![0.1, 0.2, 0.3]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        TransformOperation::RandomHorizontalFlip(RandomHorizontalFlip::new(1.0).unwrap())
            .apply(&mut image, &mut rng)
            .unwrap();
        assert_eq!(image.as_slice(), &[0.3, 0.2, 0.1]);
    }

    #[test]
    fn jitter_keeps_values_in_unit_range() {
        let mut image = ramp(3, 5, 5);
        let mut rng = StdRng::seed_from_u64(9);
        let jitter = ColorJitter::new(0.4, 0.4, 0.4).unwrap();
        TransformOperation::ColorJitter(jitter)
            .apply(&mut image, &mut rng)
            .unwrap();
        assert!(image.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(ColorJitter::new(-0.1, 0.0, 0.0).is_err());
    }

    #[test]
    fn jitter_rejects_non_rgb_tensors() {
        let mut image = ramp(2, 3, 3);
        let mut rng = StdRng::seed_from_u64(2);
        let contrast = ColorJitter::new(0.0, 0.5, 0.0).unwrap();
        assert_eq!(
            TransformOperation::ColorJitter(contrast).apply(&mut image, &mut rng),
            Err(VisionError::ChannelCount {
                expected: 3,
                got: 2
            })
        );
    }

    #[test]
    fn pipeline_runs_stages_in_order() {
        let mut pipeline = TransformPipeline::new();
        pipeline
            .add(TransformOperation::CenterCrop(CenterCrop::new(2, 2).unwrap()))
            .add(TransformOperation::Normalize(
                Normalize::new(vec![0.0], vec![0.5]).unwrap(),
            ));
        let names: Vec<_> = pipeline.operations().iter().map(|op| op.name()).collect();
        assert_eq!(names, vec!["CenterCrop", "Normalize"]);

        let mut image = ImageTensor::new(1, 3, 3, vec![0.5; 9]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        pipeline.apply(&mut image, &mut rng).unwrap();
        assert_eq!(image.shape(), (1, 2, 2));
        assert!(image.as_slice().iter().all(|v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn to_tensor_scales_and_augments() {
        let image = RgbImage::from_pixel(4, 4, image::Rgb([255, 0, 0]));
        let mut pipeline = TransformPipeline::new();
        pipeline.add(TransformOperation::Resize(Resize::new(2, 2).unwrap()));
        let transform = ToTensor::with_pipeline(pipeline);
        let mut rng = StdRng::seed_from_u64(0);
        let tensor = TileTransform::apply(&transform, &image, &mut rng).unwrap();
        assert_eq!(tensor.shape(), (3, 2, 2));
        assert_eq!(tensor.channel(0).unwrap(), &[1.0; 4]);
        assert_eq!(tensor.channel(1).unwrap(), &[0.0; 4]);
    }
}
