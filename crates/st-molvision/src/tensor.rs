// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use image::{Rgb, RgbImage};

use crate::{VisionError, VisionResult};

/// Channel-major (`C x H x W`) floating point image.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageTensor {
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl ImageTensor {
    /// Wraps a channel-major buffer after validating its length.
    pub fn new(channels: usize, height: usize, width: usize, data: Vec<f32>) -> VisionResult<Self> {
        if channels == 0 || height == 0 || width == 0 {
            return Err(VisionError::InvalidDimensions {
                channels,
                height,
                width,
            });
        }
        let expected = channels * height * width;
        if data.len() != expected {
            return Err(VisionError::DataLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            channels,
            height,
            width,
            data,
        })
    }

    /// Creates an image filled with zeros.
    pub fn zeros(channels: usize, height: usize, width: usize) -> VisionResult<Self> {
        Self::new(channels, height, width, vec![0.0; channels * height * width])
    }

    /// Converts an 8-bit RGB buffer into a `3 x H x W` tensor scaled to `[0, 1]`.
    pub fn from_rgb_image(image: &RgbImage) -> Self {
        let width = image.width() as usize;
        let height = image.height() as usize;
        let plane = width * height;
        let mut data = vec![0.0f32; 3 * plane];
        for (x, y, pixel) in image.enumerate_pixels() {
            let offset = y as usize * width + x as usize;
            for channel in 0..3 {
                data[channel * plane + offset] = f32::from(pixel[channel]) / 255.0;
            }
        }
        Self {
            channels: 3,
            height,
            width,
            data,
        }
    }

    /// Converts a 3-channel tensor back to 8-bit RGB, clamping into `[0, 1]`.
    pub fn to_rgb_image(&self) -> VisionResult<RgbImage> {
        if self.channels != 3 {
            return Err(VisionError::ChannelCount {
                expected: 3,
                got: self.channels,
            });
        }
        let plane = self.plane_len();
        let mut image = RgbImage::new(self.width as u32, self.height as u32);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let offset = y as usize * self.width + x as usize;
            let mut rgb = [0u8; 3];
            for (channel, value) in rgb.iter_mut().enumerate() {
                let v = self.data[channel * plane + offset].clamp(0.0, 1.0);
                *value = (v * 255.0).round() as u8;
            }
            *pixel = Rgb(rgb);
        }
        Ok(image)
    }

    /// Returns `(channels, height, width)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.channels, self.height, self.width)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of values in one channel plane.
    pub fn plane_len(&self) -> usize {
        self.height * self.width
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Immutable view over a single channel plane.
    pub fn channel(&self, channel: usize) -> VisionResult<&[f32]> {
        self.check_channel(channel)?;
        let plane = self.plane_len();
        Ok(&self.data[channel * plane..(channel + 1) * plane])
    }

    /// Mutable view over a single channel plane.
    pub fn channel_mut(&mut self, channel: usize) -> VisionResult<&mut [f32]> {
        self.check_channel(channel)?;
        let plane = self.plane_len();
        Ok(&mut self.data[channel * plane..(channel + 1) * plane])
    }

    /// Reads the value at `(channel, y, x)`.
    pub fn get(&self, channel: usize, y: usize, x: usize) -> Option<f32> {
        if channel >= self.channels || y >= self.height || x >= self.width {
            return None;
        }
        Some(self.data[(channel * self.height + y) * self.width + x])
    }

    fn check_channel(&self, channel: usize) -> VisionResult<()> {
        if channel >= self.channels {
            return Err(VisionError::ChannelOutOfRange {
                channel,
                channels: self.channels,
            });
        }
        Ok(())
    }
}

/// Mean value of one channel, accumulated in `f64`.
pub fn channel_mean(tensor: &ImageTensor, channel: usize) -> VisionResult<f32> {
    let plane = tensor.channel(channel)?;
    let sum: f64 = plane.iter().map(|&v| f64::from(v)).sum();
    Ok((sum / plane.len() as f64) as f32)
}
