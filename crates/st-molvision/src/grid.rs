// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Tile geometry for jigsaw composites.
//!
//! Tiles are numbered row-major: tile `n` sits in column `n % grid` and row
//! `n / grid`. The tile edge is derived from the image *width* only and may be
//! fractional; box corners are rounded to whole pixels (ties to even), so
//! widths that are not a multiple of the grid size yield tiles whose sizes
//! differ by one pixel. Regions that fall outside the source read as black.

use image::{imageops, RgbImage};

use crate::{VisionError, VisionResult};

/// Grid size used by the jigsaw task.
pub const JIGSAW_GRID: u32 = 3;

/// Pixel box of one tile in source image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileRegion {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl TileRegion {
    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }
}

/// Computes the crop box of tile `n` for an image of the given size.
pub fn tile_region(width: u32, _height: u32, grid: u32, n: usize) -> VisionResult<TileRegion> {
    let cells = (grid as usize) * (grid as usize);
    if grid == 0 || n >= cells {
        return Err(VisionError::TileIndex { index: n, grid });
    }
    let edge = f64::from(width) / f64::from(grid);
    let column = (n % grid as usize) as f64;
    let row = (n / grid as usize) as f64;
    let corner = |v: f64| v.round_ties_even() as i64;
    Ok(TileRegion {
        left: corner(column * edge),
        top: corner(row * edge),
        right: corner((column + 1.0) * edge),
        bottom: corner((row + 1.0) * edge),
    })
}

/// Crops tile `n` out of `image`.
pub fn tile(image: &RgbImage, grid: u32, n: usize) -> VisionResult<RgbImage> {
    let region = tile_region(image.width(), image.height(), grid, n)?;
    let mut out = RgbImage::new(region.width(), region.height());
    // Copy the overlap with the source; anything outside stays zero.
    let x0 = region.left.max(0);
    let y0 = region.top.max(0);
    let x1 = region.right.min(i64::from(image.width()));
    let y1 = region.bottom.min(i64::from(image.height()));
    if x1 > x0 && y1 > y0 {
        let view = imageops::crop_imm(
            image,
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        );
        imageops::replace(&mut out, &view.to_image(), x0 - region.left, y0 - region.top);
    }
    Ok(out)
}

/// Splits `image` into `grid * grid` tiles in row-major order.
pub fn split_tiles(image: &RgbImage, grid: u32) -> VisionResult<Vec<RgbImage>> {
    let cells = (grid as usize) * (grid as usize);
    (0..cells).map(|n| tile(image, grid, n)).collect()
}

/// Reorders tiles so that position `t` receives `tiles[permutation[t]]`.
pub fn permute_tiles<T: Clone>(tiles: &[T], permutation: &[usize]) -> VisionResult<Vec<T>> {
    if permutation.len() != tiles.len() {
        return Err(VisionError::InvalidPermutation(format!(
            "permutation has {} entries for {} tiles",
            permutation.len(),
            tiles.len()
        )));
    }
    permutation
        .iter()
        .map(|&source| {
            tiles.get(source).cloned().ok_or_else(|| {
                VisionError::InvalidPermutation(format!(
                    "entry {source} out of range for {} tiles",
                    tiles.len()
                ))
            })
        })
        .collect()
}

/// Places nine equally sized tiles on a 3x3 canvas, tile `i` at column
/// `i % 3` and row `i / 3`.
pub fn assemble(tiles: &[RgbImage]) -> VisionResult<RgbImage> {
    let cells = (JIGSAW_GRID * JIGSAW_GRID) as usize;
    if tiles.len() != cells {
        return Err(VisionError::TileCount {
            expected: cells,
            got: tiles.len(),
        });
    }
    let expected = tiles[0].dimensions();
    for (index, tile) in tiles.iter().enumerate() {
        if tile.dimensions() != expected {
            return Err(VisionError::TileSize {
                index,
                expected,
                got: tile.dimensions(),
            });
        }
    }
    let (tile_w, tile_h) = expected;
    let mut canvas = RgbImage::new(tile_w * JIGSAW_GRID, tile_h * JIGSAW_GRID);
    for (i, tile) in tiles.iter().enumerate() {
        let x = i64::from(tile_w) * (i as i64 % i64::from(JIGSAW_GRID));
        let y = i64::from(tile_h) * (i as i64 / i64::from(JIGSAW_GRID));
        imageops::replace(&mut canvas, tile, x, y);
    }
    Ok(canvas)
}
