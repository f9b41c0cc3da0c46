// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Vision primitives for molecular depiction pretext tasks.
//!
//! Rendered molecules arrive as [`image::RgbImage`] buffers. Geometry that has
//! to match pixel boxes exactly (tiling, composite assembly, resampling) works
//! on those buffers, while everything fed to a network is an [`ImageTensor`]:
//! a channel-major `f32` image produced by a [`TileTransform`] and optionally
//! post-processed by a [`TensorTransform`] such as [`Normalize`].

pub mod grid;
pub mod resample;
pub mod tensor;
pub mod transforms;

use thiserror::Error;

pub use grid::{assemble, permute_tiles, split_tiles, tile, tile_region, TileRegion, JIGSAW_GRID};
pub use resample::{blank_image, resize};
pub use tensor::{channel_mean, ImageTensor};
pub use transforms::augment::{ImageAugmentation, ImagePipeline, ImageTransform};
pub use transforms::{
    CenterCrop, ColorJitter, Normalize, RandomHorizontalFlip, Resize, TensorTransform,
    TileTransform, ToTensor, TransformOperation, TransformPipeline,
};

/// Result alias used throughout the vision crate.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors emitted by image tensors, tile geometry and transforms.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum VisionError {
    /// A constructor received a zero-sized shape.
    #[error("invalid image dimensions: {channels}x{height}x{width}")]
    InvalidDimensions {
        channels: usize,
        height: usize,
        width: usize,
    },
    /// Data provided to a constructor does not match the requested shape.
    #[error("data length mismatch: expected {expected}, got {got}")]
    DataLength { expected: usize, got: usize },
    /// Two images or an image and a mask disagree on their shape.
    #[error("shape mismatch: left={left:?}, right={right:?}")]
    ShapeMismatch {
        left: (usize, usize, usize),
        right: (usize, usize, usize),
    },
    #[error("channel {channel} out of range for a {channels}-channel image")]
    ChannelOutOfRange { channel: usize, channels: usize },
    /// An operation that only makes sense for a fixed channel layout (RGB)
    /// received a tensor with a different channel count.
    #[error("expected a {expected}-channel image, got {got} channels")]
    ChannelCount { expected: usize, got: usize },
    #[error("tile index {index} out of range for a {grid}x{grid} grid")]
    TileIndex { index: usize, grid: u32 },
    /// Composite assembly received the wrong number of tiles.
    #[error("tile assembly expects {expected} tiles, got {got}")]
    TileCount { expected: usize, got: usize },
    /// Composite assembly received tiles of differing sizes.
    #[error("tile {index} is {got:?}, expected {expected:?}")]
    TileSize {
        index: usize,
        expected: (u32, u32),
        got: (u32, u32),
    },
    #[error("invalid permutation: {0}")]
    InvalidPermutation(String),
    /// Generic configuration violation for a transform parameter.
    #[error("invalid transform parameter `{label}`: {message}")]
    InvalidParameter {
        label: &'static str,
        message: String,
    },
}
