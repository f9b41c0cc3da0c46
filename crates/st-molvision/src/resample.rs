// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Resampling helpers for 8-bit RGB depictions.

use image::imageops::{self, FilterType};
use image::RgbImage;

/// Resizes with a bicubic (Catmull-Rom) kernel. Returns a copy when the size
/// already matches.
pub fn resize(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.width() == width && image.height() == height {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::CatmullRom)
}

/// Zero-filled RGB image, used as the placeholder for failed renders.
pub fn blank_image(width: u32, height: u32) -> RgbImage {
    RgbImage::new(width, height)
}
