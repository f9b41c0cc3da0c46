use clap::{Args, Parser, Subcommand, ValueHint};
use serde::Serialize;
use spiral_config::determinism::{self, rng_from_optional, DeterminismConfig};
use spiral_config::tracing::InitError;
use spiral_molpretext::{
    train_val_split, JigsawConfig, JigsawDataset, JigsawSample, ManifestRenderer, MoleculeFrame,
    PermutationCatalog,
};
use st_molvision::{ImageAugmentation, ImagePipeline, ImageTensor};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

type DynError = Box<dyn Error>;

type Result<T> = std::result::Result<T, DynError>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Jigsaw and masked-view pretext datasets for molecular depictions"
)]
struct Cli {
    /// Derive every generator without an explicit seed from this base seed
    #[arg(long, global = true)]
    deterministic_seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Shuffle a SMILES CSV and write train and validation splits
    Split(SplitArgs),

    /// Load a permutation table and print a JSON summary
    Catalog(CatalogArgs),

    /// Build one sample and write its views as PNG files
    Preview(PreviewArgs),

    /// Build many samples and print the label histogram as JSON
    Histogram(HistogramArgs),
}

#[derive(Args)]
struct SplitArgs {
    /// CSV file with a `smiles` column
    #[arg(long, value_hint = ValueHint::FilePath)]
    dataset: PathBuf,

    /// Fraction of rows assigned to the validation split
    #[arg(long, default_value_t = 0.1)]
    val_size: f64,

    /// Seed for the shuffle; falls back to the deterministic environment
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_hint = ValueHint::FilePath)]
    train_out: PathBuf,

    #[arg(long, value_hint = ValueHint::FilePath)]
    val_out: PathBuf,
}

#[derive(Args)]
struct CatalogArgs {
    /// Directory holding `permutations_<N>.npy`
    #[arg(long, value_hint = ValueHint::DirPath, default_value = ".")]
    permutations_dir: PathBuf,

    /// Number of jigsaw classes, identity included
    #[arg(long)]
    jig_classes: usize,
}

#[derive(Args)]
struct DatasetArgs {
    /// CSV file with a `smiles` column
    #[arg(long, value_hint = ValueHint::FilePath)]
    dataset: PathBuf,

    /// CSV mapping `smiles` to pre-rendered `image` files
    #[arg(long, value_hint = ValueHint::FilePath)]
    manifest: PathBuf,

    /// Optional TOML dataset configuration
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Overrides the directory holding the permutation table
    #[arg(long, value_hint = ValueHint::DirPath)]
    permutations_dir: Option<PathBuf>,

    /// Overrides the number of jigsaw classes
    #[arg(long)]
    jig_classes: Option<usize>,

    /// Overrides the seed from the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Probability of mirroring each depiction before tiling
    #[arg(long)]
    hflip: Option<f32>,
}

#[derive(Args)]
struct PreviewArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// Row to build
    #[arg(long, default_value_t = 0)]
    index: usize,

    /// Directory receiving the PNG views and `summary.json`
    #[arg(long, value_hint = ValueHint::DirPath)]
    out: PathBuf,
}

#[derive(Args)]
struct HistogramArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// Number of samples to draw
    #[arg(long, default_value_t = 100)]
    trials: usize,

    /// Restrict the draws to one row instead of cycling through the dataset
    #[arg(long)]
    index: Option<usize>,
}

#[derive(Serialize)]
struct SplitSummary {
    rows: usize,
    train: usize,
    val: usize,
}

#[derive(Serialize)]
struct CatalogSummary {
    class_count: usize,
    permutations: Vec<[usize; 9]>,
}

#[derive(Serialize)]
struct PreviewSummary {
    index: usize,
    smiles: String,
    label: usize,
    jigsaw: [usize; 3],
    full: [usize; 3],
    thumbnail: [usize; 3],
    files: Vec<String>,
}

#[derive(Serialize)]
struct Histogram {
    trials: usize,
    counts: Vec<usize>,
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    // A subscriber installed elsewhere is fine.
    match spiral_config::tracing::init_tracing_with("warn") {
        Ok(()) | Err(InitError::AlreadyInitialised) => {}
        Err(err) => return Err(err.into()),
    }
    if let Some(base_seed) = cli.deterministic_seed {
        determinism::configure(DeterminismConfig {
            enabled: true,
            base_seed,
        });
    }
    match &cli.command {
        Command::Split(args) => run_split(args),
        Command::Catalog(args) => run_catalog(args),
        Command::Preview(args) => run_preview(args),
        Command::Histogram(args) => run_histogram(args),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_split(args: &SplitArgs) -> Result<()> {
    let frame = MoleculeFrame::from_csv_path(&args.dataset)?;
    let mut rng = rng_from_optional(args.seed, "st-molpretext-split");
    let (train, val) = train_val_split(&frame, args.val_size, &mut rng)?;
    train.write_csv(&args.train_out)?;
    val.write_csv(&args.val_out)?;
    info!(train = train.len(), val = val.len(), "wrote dataset splits");
    print_json(&SplitSummary {
        rows: frame.len(),
        train: train.len(),
        val: val.len(),
    })
}

fn run_catalog(args: &CatalogArgs) -> Result<()> {
    let catalog = PermutationCatalog::load_from_dir(&args.permutations_dir, args.jig_classes)?;
    print_json(&CatalogSummary {
        class_count: catalog.class_count(),
        permutations: catalog.permutations().to_vec(),
    })
}

fn load_config(args: &DatasetArgs) -> Result<JigsawConfig> {
    let mut config = match &args.config {
        Some(path) => JigsawConfig::load(path)?,
        None => JigsawConfig::default(),
    };
    if let Some(dir) = &args.permutations_dir {
        config.permutations_dir = dir.clone();
    }
    if let Some(classes) = args.jig_classes {
        config.jig_classes = classes;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate()?;
    Ok(config)
}

fn build_dataset(args: &DatasetArgs, config: &JigsawConfig) -> Result<JigsawDataset<MoleculeFrame>> {
    let rows = MoleculeFrame::from_csv_path(&args.dataset)?;
    let renderer = ManifestRenderer::from_manifest(&args.manifest)?;
    let mut dataset = JigsawDataset::from_config(rows, renderer, config)?;
    if let Some(p) = args.hflip {
        let mut pipeline = ImagePipeline::new();
        pipeline.add(ImageAugmentation::horizontal_flip(p)?);
        dataset = dataset.with_image_transform(pipeline);
    }
    Ok(dataset)
}

fn shape(tensor: &ImageTensor) -> [usize; 3] {
    let (c, h, w) = tensor.shape();
    [c, h, w]
}

fn write_views(sample: &JigsawSample, out: &Path) -> Result<Vec<String>> {
    fs::create_dir_all(out)?;
    let views = [
        ("jigsaw.png", &sample.jigsaw),
        ("full.png", &sample.full),
        ("thumbnail.png", &sample.thumbnail),
        ("masked_full.png", &sample.masked_full),
        ("masked_thumbnail.png", &sample.masked_thumbnail),
    ];
    let mut files = Vec::with_capacity(views.len());
    for (name, tensor) in views {
        tensor.to_rgb_image()?.save(out.join(name))?;
        files.push(name.to_string());
    }
    Ok(files)
}

fn run_preview(args: &PreviewArgs) -> Result<()> {
    let config = load_config(&args.dataset)?;
    let dataset = build_dataset(&args.dataset, &config)?;
    let mut rng = rng_from_optional(config.seed, "st-molpretext-preview");
    let sample = dataset.get_item(args.index, &mut rng)?;
    let files = write_views(&sample, &args.out)?;
    let summary = PreviewSummary {
        index: args.index,
        smiles: dataset
            .rows()
            .rows()
            .get(args.index)
            .cloned()
            .unwrap_or_default(),
        label: sample.label,
        jigsaw: shape(&sample.jigsaw),
        full: shape(&sample.full),
        thumbnail: shape(&sample.thumbnail),
        files,
    };
    fs::write(
        args.out.join("summary.json"),
        serde_json::to_string_pretty(&summary)?,
    )?;
    print_json(&summary)
}

fn run_histogram(args: &HistogramArgs) -> Result<()> {
    let config = load_config(&args.dataset)?;
    let dataset = build_dataset(&args.dataset, &config)?;
    if dataset.is_empty() {
        return Err("dataset has no rows".into());
    }
    let mut rng = rng_from_optional(config.seed, "st-molpretext-histogram");
    let mut counts = vec![0usize; dataset.num_labels()];
    for trial in 0..args.trials {
        let index = args.index.unwrap_or(trial % dataset.len());
        let sample = dataset.get_item(index, &mut rng)?;
        counts[sample.label] += 1;
    }
    print_json(&Histogram {
        trials: args.trials,
        counts,
    })
}
