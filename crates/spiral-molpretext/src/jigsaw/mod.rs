//! Per-row construction of jigsaw and masked-reconstruction samples.

use std::sync::Arc;

use image::RgbImage;
use rand::{Rng, RngCore};
use st_molvision::{
    assemble, blank_image, permute_tiles, resize, split_tiles, ImageTensor, ImageTransform,
    TensorTransform, TileTransform, ToTensor, JIGSAW_GRID,
};
use tracing::{debug, warn};

use crate::config::JigsawConfig;
use crate::dataset::SmilesSource;
use crate::masks::MaskSpec;
use crate::permutations::PermutationCatalog;
use crate::render::{MoleculeRenderer, RenderResult, RENDER_EDGE};
use crate::{PretextError, Result};

/// Edge the depiction is resized to before tiling; divisible by the grid.
pub const TILING_EDGE: u32 = 222;
/// Edge of the composite fed to the network.
pub const COMPOSITE_EDGE: u32 = 224;
/// Edge of the downsampled reconstruction view.
pub const THUMBNAIL_EDGE: u32 = 64;

/// One training example.
#[derive(Clone, Debug, PartialEq)]
pub struct JigsawSample {
    /// Tile composite, possibly shuffled.
    pub jigsaw: ImageTensor,
    /// Permutation class; 0 means the tiles kept their order.
    pub label: usize,
    /// Unshuffled full-size view.
    pub full: ImageTensor,
    /// Unshuffled 64x64 view.
    pub thumbnail: ImageTensor,
    pub masked_full: ImageTensor,
    pub masked_thumbnail: ImageTensor,
}

/// Builds [`JigsawSample`]s for the rows of a [`SmilesSource`].
///
/// All state is read-only after construction, so one dataset can serve
/// concurrent retrievals; randomness comes from the generator passed to each
/// call.
pub struct JigsawDataset<S: SmilesSource> {
    rows: S,
    catalog: Arc<PermutationCatalog>,
    renderer: Box<dyn MoleculeRenderer>,
    image_transform: Option<Box<dyn ImageTransform>>,
    tile_transform: Box<dyn TileTransform>,
    normalize: Option<Box<dyn TensorTransform>>,
    bias_whole_image: Option<f64>,
    mask: MaskSpec,
}

impl<S: SmilesSource> JigsawDataset<S> {
    pub fn new(
        rows: S,
        catalog: Arc<PermutationCatalog>,
        renderer: impl MoleculeRenderer + 'static,
        mask: MaskSpec,
        bias_whole_image: Option<f64>,
    ) -> Result<Self> {
        if let Some(bias) = bias_whole_image {
            if !(0.0..=1.0).contains(&bias) {
                return Err(PretextError::InvalidArgument(format!(
                    "bias_whole_image must lie in [0, 1], got {bias}"
                )));
            }
        }
        Ok(Self {
            rows,
            catalog,
            renderer: Box::new(renderer),
            image_transform: None,
            tile_transform: Box::new(ToTensor::new()),
            normalize: None,
            bias_whole_image,
            mask,
        })
    }

    /// Loads the permutation table named by `config` and builds the dataset.
    /// A missing table is fatal.
    pub fn from_config(
        rows: S,
        renderer: impl MoleculeRenderer + 'static,
        config: &JigsawConfig,
    ) -> Result<Self> {
        config.validate()?;
        let catalog =
            PermutationCatalog::load_from_dir(&config.permutations_dir, config.jig_classes)?;
        Self::new(
            rows,
            Arc::new(catalog),
            renderer,
            config.mask.spec()?,
            config.bias_whole_image,
        )
    }

    /// Augmentation applied to each rendered depiction.
    pub fn with_image_transform(mut self, transform: impl ImageTransform + 'static) -> Self {
        self.image_transform = Some(Box::new(transform));
        self
    }

    /// Conversion (and augmentation) of composites and views into tensors.
    pub fn with_tile_transform(mut self, transform: impl TileTransform + 'static) -> Self {
        self.tile_transform = Box::new(transform);
        self
    }

    /// Final transform applied to every tensor of a sample.
    pub fn with_normalize(mut self, transform: impl TensorTransform + 'static) -> Self {
        self.normalize = Some(Box::new(transform));
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn catalog(&self) -> &PermutationCatalog {
        &self.catalog
    }

    pub fn rows(&self) -> &S {
        &self.rows
    }

    /// Number of distinct labels, identity included.
    pub fn num_labels(&self) -> usize {
        self.catalog.len() + 1
    }

    /// Renders row `index`, substituting a blank depiction when rendering
    /// fails, then applies the image transform.
    pub fn get_image(&self, index: usize, rng: &mut dyn RngCore) -> Result<RgbImage> {
        let smiles = self
            .rows
            .smiles(index)
            .ok_or(PretextError::IndexOutOfRange {
                index,
                len: self.rows.len(),
            })?;
        let image = match self.renderer.render(smiles) {
            RenderResult::Rendered(image) => image,
            RenderResult::Failed(reason) => {
                warn!(%smiles, %reason, "cannot render SMILES, using a blank depiction");
                blank_image(RENDER_EDGE, RENDER_EDGE)
            }
        };
        Ok(match &self.image_transform {
            Some(transform) => transform.apply(image, rng),
            None => image,
        })
    }

    /// Draws a permutation class, then lets the whole-image bias override it
    /// with the identity.
    pub fn draw_class(&self, rng: &mut dyn RngCore) -> usize {
        let class = rng.gen_range(0..=self.catalog.len());
        match self.bias_whole_image {
            Some(bias) if bias > 0.0 && bias > rng.gen::<f64>() => 0,
            _ => class,
        }
    }

    /// Tiles the depiction, shuffles the tiles by a drawn class and returns the
    /// transformed composite together with that class.
    pub fn build_tiles(
        &self,
        image: &RgbImage,
        rng: &mut dyn RngCore,
    ) -> Result<(ImageTensor, usize)> {
        let tiling = resize(image, TILING_EDGE, TILING_EDGE);
        let tiles = split_tiles(&tiling, JIGSAW_GRID)?;
        let class = self.draw_class(rng);
        let ordered = match self.catalog.for_class(class) {
            Some(permutation) => permute_tiles(&tiles, permutation)?,
            None => tiles,
        };
        let composite = resize(&assemble(&ordered)?, COMPOSITE_EDGE, COMPOSITE_EDGE);
        let tensor = self.tile_transform.apply(&composite, rng)?;
        Ok((tensor, class))
    }

    /// Masks the two unshuffled views.
    pub fn build_masks(
        &self,
        full: &ImageTensor,
        thumbnail: &ImageTensor,
        rng: &mut dyn RngCore,
    ) -> Result<(ImageTensor, ImageTensor)> {
        self.mask.build_masks(full, thumbnail, rng)
    }

    fn normalize_tensor(&self, tensor: &mut ImageTensor, rng: &mut dyn RngCore) -> Result<()> {
        if let Some(normalize) = &self.normalize {
            normalize.apply(tensor, rng)?;
        }
        Ok(())
    }

    /// Builds the sample for row `index`.
    pub fn get_item<R: Rng>(&self, index: usize, rng: &mut R) -> Result<JigsawSample> {
        let rng: &mut dyn RngCore = rng;
        let image = self.get_image(index, rng)?;
        let thumbnail_image = resize(&image, THUMBNAIL_EDGE, THUMBNAIL_EDGE);

        let (mut jigsaw, label) = self.build_tiles(&image, rng)?;

        let mut full = self.tile_transform.apply(&image, rng)?;
        let mut thumbnail = self.tile_transform.apply(&thumbnail_image, rng)?;
        let (mut masked_full, mut masked_thumbnail) = self.build_masks(&full, &thumbnail, rng)?;

        for tensor in [
            &mut jigsaw,
            &mut thumbnail,
            &mut full,
            &mut masked_full,
            &mut masked_thumbnail,
        ] {
            self.normalize_tensor(tensor, rng)?;
        }

        debug!(index, label, "built jigsaw sample");
        Ok(JigsawSample {
            jigsaw,
            label,
            full,
            thumbnail,
            masked_full,
            masked_thumbnail,
        })
    }
}
