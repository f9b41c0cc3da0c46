use std::path::Path;

use image::{Rgb, RgbImage};
use ndarray::{array, Array2};
use ndarray_npy::write_npy;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use spiral_molpretext::jigsaw::{COMPOSITE_EDGE, THUMBNAIL_EDGE};
use spiral_molpretext::render::RENDER_EDGE;
use spiral_molpretext::{
    CatalogError, JigsawConfig, JigsawDataset, JigsawLoader, MaskType, MoleculeFrame,
    PermutationCatalog, PretextError, RenderResult,
};
use st_molvision::{channel_mean, ImageTensor, VisionResult};

fn stripes(smiles: &str) -> RenderResult {
    if smiles.starts_with('!') {
        return RenderResult::Failed("invalid SMILES".to_string());
    }
    RenderResult::Rendered(RgbImage::from_fn(RENDER_EDGE, RENDER_EDGE, |x, y| {
        Rgb([(x / 8 * 9) as u8, (y / 8 * 9) as u8, ((x + y) / 2) as u8])
    }))
}

fn write_table(dir: &Path, classes: usize, table: &Array2<i64>) {
    write_npy(PermutationCatalog::table_path(dir, classes), table).unwrap();
}

fn config(dir: &Path, classes: usize, bias: Option<f64>) -> JigsawConfig {
    JigsawConfig {
        jig_classes: classes,
        bias_whole_image: bias,
        permutations_dir: dir.to_path_buf(),
        ..JigsawConfig::default()
    }
}

#[test]
fn two_class_catalog_yields_balanced_labels() {
    let dir = tempfile::tempdir().unwrap();
    write_table(dir.path(), 2, &array![[8i64, 7, 6, 5, 4, 3, 2, 1, 0]]);
    let data = JigsawDataset::from_config(
        MoleculeFrame::from_smiles(["CCO"]),
        stripes,
        &config(dir.path(), 2, Some(0.0)),
    )
    .unwrap();
    assert_eq!(data.num_labels(), 2);

    let mut rng = StdRng::seed_from_u64(2024);
    let trials = 400;
    let mut shuffled = 0;
    for _ in 0..trials {
        let sample = data.get_item(0, &mut rng).unwrap();
        assert!(sample.label <= 1);
        shuffled += sample.label;
        assert_eq!(sample.jigsaw.shape(), (3, COMPOSITE_EDGE as usize, COMPOSITE_EDGE as usize));
        assert_eq!(
            sample.masked_thumbnail.shape(),
            (3, THUMBNAIL_EDGE as usize, THUMBNAIL_EDGE as usize)
        );
    }
    let share = shuffled as f64 / trials as f64;
    assert!((share - 0.5).abs() < 0.1, "share of shuffled samples: {share}");
}

#[test]
fn identity_samples_differ_from_shuffled_ones() {
    let dir = tempfile::tempdir().unwrap();
    write_table(dir.path(), 2, &array![[8i64, 7, 6, 5, 4, 3, 2, 1, 0]]);
    let data = JigsawDataset::from_config(
        vec!["CCO".to_string()],
        stripes,
        &config(dir.path(), 2, None),
    )
    .unwrap();

    let mut rng = StdRng::seed_from_u64(5);
    let mut identity = None;
    let mut reversed = None;
    while identity.is_none() || reversed.is_none() {
        let sample = data.get_item(0, &mut rng).unwrap();
        match sample.label {
            0 => identity = Some(sample.jigsaw),
            _ => reversed = Some(sample.jigsaw),
        }
    }
    let (identity, reversed) = (identity.unwrap(), reversed.unwrap());
    // The identity composite is the depiction itself up to resampling error.
    let full = image::imageops::resize(
        &match stripes("CCO") {
            RenderResult::Rendered(image) => image,
            RenderResult::Failed(reason) => panic!("{reason}"),
        },
        222,
        222,
        image::imageops::FilterType::CatmullRom,
    );
    let full = image::imageops::resize(&full, 224, 224, image::imageops::FilterType::CatmullRom);
    let full = st_molvision::ImageTensor::from_rgb_image(&full);
    let max_diff = |a: &st_molvision::ImageTensor, b: &st_molvision::ImageTensor| {
        a.as_slice()
            .iter()
            .zip(b.as_slice())
            .map(|(x, y)| (x - y).abs())
            .fold(0.0f32, f32::max)
    };
    assert!(max_diff(&identity, &full) < 1e-6);
    assert!(max_diff(&reversed, &full) > 0.1);
}

#[test]
fn full_bias_forces_identity() {
    let dir = tempfile::tempdir().unwrap();
    let table = array![
        [1i64, 2, 3, 4, 5, 6, 7, 8, 9],
        [9, 8, 7, 6, 5, 4, 3, 2, 1],
        [2, 1, 3, 4, 5, 6, 7, 8, 9]
    ];
    write_table(dir.path(), 4, &table);
    let data = JigsawDataset::from_config(
        vec!["C".to_string(), "CC".to_string()],
        stripes,
        &config(dir.path(), 4, Some(1.0)),
    )
    .unwrap();
    let mut rng = StdRng::seed_from_u64(0);
    for _ in 0..50 {
        assert_eq!(data.get_item(1, &mut rng).unwrap().label, 0);
    }
}

#[test]
fn one_based_files_are_reindexed() {
    let dir = tempfile::tempdir().unwrap();
    write_table(dir.path(), 3, &array![[1i64, 2, 3, 4, 5, 6, 7, 8, 9], [3, 2, 1, 6, 5, 4, 9, 8, 7]]);
    let catalog = PermutationCatalog::load_from_dir(dir.path(), 3).unwrap();
    assert_eq!(catalog.for_class(1), Some(&[0, 1, 2, 3, 4, 5, 6, 7, 8]));
    assert_eq!(catalog.for_class(2), Some(&[2, 1, 0, 5, 4, 3, 8, 7, 6]));

    write_npy(
        PermutationCatalog::table_path(dir.path(), 2),
        &array![[0i32, 2, 1, 3, 4, 5, 6, 7, 8]],
    )
    .unwrap();
    let catalog = PermutationCatalog::load_from_dir(dir.path(), 2).unwrap();
    assert_eq!(catalog.for_class(1), Some(&[0, 2, 1, 3, 4, 5, 6, 7, 8]));
}

#[test]
fn missing_table_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = JigsawDataset::from_config(vec!["C".to_string()], stripes, &config(dir.path(), 30, None))
        .err()
        .unwrap();
    assert!(matches!(
        err,
        PretextError::Catalog(CatalogError::NotFound { class_count: 30, .. })
    ));
}

#[test]
fn unrenderable_rows_fall_back_to_blank_views() {
    let dir = tempfile::tempdir().unwrap();
    write_table(dir.path(), 2, &array![[1i64, 0, 2, 3, 4, 5, 6, 7, 8]]);
    let mut cfg = config(dir.path(), 2, None);
    cfg.mask.mask_type = MaskType::RandomMask;
    let data = JigsawDataset::from_config(vec!["!bad".to_string()], stripes, &cfg).unwrap();
    let sample = data.get_item(0, &mut StdRng::seed_from_u64(1)).unwrap();
    for tensor in [
        &sample.jigsaw,
        &sample.full,
        &sample.thumbnail,
        &sample.masked_full,
        &sample.masked_thumbnail,
    ] {
        assert!(tensor.as_slice().iter().all(|&v| v == 0.0));
    }
}

#[test]
fn seeded_loader_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    write_table(dir.path(), 2, &array![[8i64, 7, 6, 5, 4, 3, 2, 1, 0]]);
    let rows = MoleculeFrame::from_smiles(["C", "CC", "CCC", "CCCC", "CCCCC"]);
    let data = JigsawDataset::from_config(rows, stripes, &config(dir.path(), 2, Some(0.2))).unwrap();
    let loader = JigsawLoader::new(&data, 2).unwrap().shuffle(true).seed(17);
    let first: Vec<_> = loader.epoch(3).collect::<Result<Vec<_>, _>>().unwrap();
    let second: Vec<_> = loader.epoch(3).collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.iter().map(Vec::len).sum::<usize>(), 5);
}

#[test]
fn tile_transform_feeds_masks_and_normalize_runs_last() {
    let dir = tempfile::tempdir().unwrap();
    write_table(dir.path(), 2, &array![[8i64, 7, 6, 5, 4, 3, 2, 1, 0]]);
    let mut cfg = config(dir.path(), 2, None);
    cfg.mask.mask_type = MaskType::RandomMask;
    cfg.mask.mask_ratio = 1.0;

    let shift_green = |image: &RgbImage, _rng: &mut dyn RngCore| -> VisionResult<ImageTensor> {
        let mut tensor = ImageTensor::from_rgb_image(image);
        for value in tensor.channel_mut(1)? {
            *value += 0.5;
        }
        Ok(tensor)
    };
    let double = |tensor: &mut ImageTensor, _rng: &mut dyn RngCore| -> VisionResult<()> {
        for value in tensor.as_mut_slice() {
            *value *= 2.0;
        }
        Ok(())
    };
    let data = JigsawDataset::from_config(vec!["CCO".to_string()], stripes, &cfg)
        .unwrap()
        .with_tile_transform(shift_green)
        .with_normalize(double);

    let image = match stripes("CCO") {
        RenderResult::Rendered(image) => image,
        RenderResult::Failed(reason) => panic!("{reason}"),
    };
    let thumbnail = st_molvision::resize(&image, THUMBNAIL_EDGE, THUMBNAIL_EDGE);
    let mut rng = StdRng::seed_from_u64(12);
    let sample = data.get_item(0, &mut rng).unwrap();

    for (source, view, masked) in [
        (&image, &sample.full, &sample.masked_full),
        (&thumbnail, &sample.thumbnail, &sample.masked_thumbnail),
    ] {
        let raw = ImageTensor::from_rgb_image(source);
        for channel in 0..3 {
            let shift = if channel == 1 { 0.5 } else { 0.0 };
            // Every pixel is masked, so each plane is the doubled mean of the
            // shifted view.
            let fill = 2.0 * (channel_mean(&raw, channel).unwrap() + shift);
            assert!(
                masked.channel(channel).unwrap().iter().all(|v| (v - fill).abs() < 1e-4),
                "channel {channel} expected {fill}"
            );
            for (got, want) in view.channel(channel).unwrap().iter().zip(raw.channel(channel).unwrap()) {
                assert!((got - 2.0 * (want + shift)).abs() < 1e-5);
            }
        }
    }

    // The composite only ever holds resampled depiction pixels, so a shifted
    // and doubled green plane cannot drop below 1.0.
    assert!(sample.jigsaw.channel(1).unwrap().iter().all(|&v| v >= 1.0 - 1e-5));
    assert!(sample.jigsaw.channel(0).unwrap().iter().all(|&v| (0.0..=2.0 + 1e-5).contains(&v)));
}
