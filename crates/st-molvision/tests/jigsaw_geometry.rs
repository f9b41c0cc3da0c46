// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::SeedableRng;
use st_molvision::{
    assemble, channel_mean, permute_tiles, resize, split_tiles, tile, tile_region, ImageTensor,
    TileTransform, ToTensor, JIGSAW_GRID,
};

fn checkerboard(size: u32) -> RgbImage {
    RgbImage::from_fn(size, size, |x, y| {
        let cell = ((x / 37) + (y / 37)) % 2;
        if cell == 0 {
            Rgb([250, 250, 250])
        } else {
            Rgb([20, 40, 80 + (x % 50) as u8])
        }
    })
}

#[test]
fn tile_geometry_depends_only_on_index_and_size() {
    let first = checkerboard(222);
    let second = RgbImage::from_pixel(222, 222, Rgb([1, 2, 3]));
    for n in 0..9 {
        let a = tile_region(first.width(), first.height(), JIGSAW_GRID, n).unwrap();
        let b = tile_region(second.width(), second.height(), JIGSAW_GRID, n).unwrap();
        assert_eq!(a, b);
        assert_eq!(tile(&first, JIGSAW_GRID, n).unwrap(), tile(&first, JIGSAW_GRID, n).unwrap());
    }
}

#[test]
fn resized_identity_composite_matches_intermediate() {
    let rendered = checkerboard(224);
    let intermediate = resize(&rendered, 222, 222);
    let tiles = split_tiles(&intermediate, JIGSAW_GRID).unwrap();
    let composite = assemble(&tiles).unwrap();
    assert_eq!(composite, intermediate);
    assert_eq!(resize(&composite, 224, 224).dimensions(), (224, 224));
}

#[test]
fn permuted_composite_places_source_tiles() {
    let intermediate = resize(&checkerboard(224), 222, 222);
    let tiles = split_tiles(&intermediate, JIGSAW_GRID).unwrap();
    let permutation = [2, 0, 1, 5, 3, 4, 8, 6, 7];
    let composite = assemble(&permute_tiles(&tiles, &permutation).unwrap()).unwrap();
    for (position, &source) in permutation.iter().enumerate() {
        assert_eq!(tile(&composite, JIGSAW_GRID, position).unwrap(), tiles[source]);
    }
}

#[test]
fn tensor_conversion_preserves_channel_means() {
    let image = RgbImage::from_pixel(8, 8, Rgb([51, 102, 204]));
    let mut rng = StdRng::seed_from_u64(0);
    let tensor: ImageTensor = ToTensor::new().apply(&image, &mut rng).unwrap();
    assert!((channel_mean(&tensor, 0).unwrap() - 0.2).abs() < 1e-6);
    assert!((channel_mean(&tensor, 1).unwrap() - 0.4).abs() < 1e-6);
    assert!((channel_mean(&tensor, 2).unwrap() - 0.8).abs() < 1e-6);
}
