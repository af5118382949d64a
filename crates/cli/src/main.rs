//! Anime recommender dataset CLI
//!
//! Extracts the packaged archive, prepares reproducible training inputs and
//! hands them to the storage and training collaborators.

use anyhow::{bail, Context, Result};
use animerec_dataset::collaborators::{
    resolve_training, LocalObjectStore, ManifestJobSubmitter, ObjectUploader, ProcessEnvResolver,
    TrainingJobRequest, TrainingJobSubmitter,
};
use animerec_dataset::pipeline::{has_outputs, read_dimension};
use animerec_dataset::schema::outputs;
use animerec_dataset::serialization::json_document;
use animerec_dataset::sinks::delimited;
use animerec_dataset::sinks::{libsvm, recordio};
use animerec_dataset::{Pipeline, PipelineConfig};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "animerec")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Reproducible dataset preparation for the anime recommender", long_about = None)]
struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Unpack the archive into the raw directory
    Extract,
    /// Run the full preparation pipeline
    Prepare {
        /// Train fraction in (0, 1]
        #[arg(long)]
        ratio: Option<f64>,

        /// Permutation seed
        #[arg(long)]
        seed: Option<u64>,

        /// Keep only items of this type (e.g. TV)
        #[arg(long)]
        type_filter: Option<String>,

        /// Reuse an already extracted raw directory
        #[arg(long)]
        skip_extract: bool,
    },
    /// Upload train/test files and submit a training job
    Publish {
        /// Which encoded files to hand to the trainer
        #[arg(long, value_enum, default_value = "recordio")]
        format: Format,

        /// Local object store root
        #[arg(long, default_value = "store")]
        store: PathBuf,

        /// Directory receiving submitted job requests
        #[arg(long, default_value = "jobs")]
        jobs: PathBuf,
    },
    /// Print the resolved configuration as canonical JSON
    ShowConfig,
    /// Read back a RecordIO-protobuf or libSVM output file
    Inspect {
        file: PathBuf,

        /// Number of rows to print
        #[arg(long, default_value = "5")]
        head: usize,

        /// Feature dimension (defaults to the sibling dimension.txt)
        #[arg(long)]
        dimension: Option<usize>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Recordio,
    Libsvm,
}

impl Format {
    fn files(self) -> (&'static str, &'static str) {
        match self {
            Format::Recordio => (outputs::TRAIN_RECORDIO, outputs::TEST_RECORDIO),
            Format::Libsvm => (outputs::TRAIN_LIBSVM, outputs::TEST_LIBSVM),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract => {
            let raw = Pipeline::new(config)?.extract()?;
            info!("Raw tables ready in {}", raw.dir.display());
        }
        Commands::Prepare {
            ratio,
            seed,
            type_filter,
            skip_extract,
        } => {
            if let Some(ratio) = ratio {
                config.split.ratio = ratio;
            }
            if let Some(seed) = seed {
                config.split.seed = seed;
            }
            if type_filter.is_some() {
                config.dataset.type_filter = type_filter;
            }
            prepare(config, skip_extract)?;
        }
        Commands::Publish {
            format,
            store,
            jobs,
        } => publish(config, format, &store, &jobs)?,
        Commands::ShowConfig => show_config(&config)?,
        Commands::Inspect {
            file,
            head,
            dimension,
        } => inspect(&file, head, dimension)?,
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config
        .apply_env()
        .context("Invalid environment override")?;
    Ok(config)
}

fn prepare(config: PipelineConfig, skip_extract: bool) -> Result<()> {
    let pipeline = Pipeline::new(config)?;

    info!("Anime recommender dataset preparation v{}", animerec_dataset::VERSION);
    info!("═══════════════════════════════════════════");
    let manifest = pipeline.run(skip_extract).context("Pipeline run failed")?;

    info!("═══════════════════════════════════════════");
    info!("✓ Preparation completed");
    info!("  Joined rows: {}", manifest.joined_rows);
    info!("  Train rows: {}", manifest.train_rows);
    info!("  Test rows: {}", manifest.test_rows);
    info!("  Feature dimension: {}", manifest.feature_dimension);
    info!("  Output: {}", pipeline.layout().dir.display());
    Ok(())
}

fn publish(config: PipelineConfig, format: Format, store: &Path, jobs: &Path) -> Result<()> {
    let pipeline = Pipeline::new(config)?;
    let layout = pipeline.layout();
    if !has_outputs(&layout.dir) {
        bail!(
            "No prepared outputs in {}; run `animerec prepare` first",
            layout.dir.display()
        );
    }

    let training = &pipeline.config().training;
    let resolved = resolve_training(training, &ProcessEnvResolver)
        .context("Failed to resolve training environment")?;
    let feature_dim = read_dimension(&layout)?;

    let uploader = LocalObjectStore::new(store);
    let (train_file, test_file) = format.files();
    let train_uri = uploader.upload(
        &layout.file(train_file),
        &format!("{}/train/{}", training.prefix, train_file),
    )?;
    let test_uri = uploader.upload(
        &layout.file(test_file),
        &format!("{}/test/{}", training.prefix, test_file),
    )?;

    let request = TrainingJobRequest::new(&resolved, train_uri, test_uri, feature_dim, Utc::now());
    let job_name = ManifestJobSubmitter::new(jobs).submit(&request)?;
    info!("Training job {} submitted with feature_dim={}", job_name, feature_dim);
    Ok(())
}

fn show_config(config: &PipelineConfig) -> Result<()> {
    let resolved = match resolve_training(&config.training, &ProcessEnvResolver) {
        Ok(resolved) => serde_json::json!({
            "region": resolved.region,
            "role": resolved.role,
        }),
        Err(err) => {
            warn!("Training environment not resolvable: {}", err);
            serde_json::Value::Null
        }
    };

    let view = serde_json::json!({
        "config": config,
        "resolved": resolved,
    });
    print!("{}", json_document(&view)?);
    Ok(())
}

fn inspect(file: &Path, head: usize, dimension: Option<usize>) -> Result<()> {
    match file.extension().and_then(|e| e.to_str()) {
        Some("protobuf") => {
            let records = recordio::read(file)?;
            println!("{}: {} records", file.display(), records.len());
            for record in records.iter().take(head) {
                let (keys, values) = record
                    .features()
                    .map(|t| (t.keys.clone(), t.values.clone()))
                    .unwrap_or_default();
                println!(
                    "  label={:?} keys={:?} values={:?}",
                    record.label(),
                    keys,
                    values
                );
            }
        }
        Some("libsvm") => {
            let dimension = match dimension {
                Some(d) => d,
                None => {
                    let sibling = file.with_file_name(outputs::DIMENSION);
                    delimited::read_dimension(&sibling).with_context(|| {
                        format!("No --dimension given and {} unreadable", sibling.display())
                    })?
                }
            };
            // Wide labels keep lookup identifiers exact
            let (matrix, labels) = libsvm::read_labeled::<f64>(file, dimension)?;
            println!("{}: {} rows, {} columns", file.display(), matrix.rows(), matrix.cols);
            for (i, label) in labels.iter().enumerate().take(head) {
                let (cols, values) = matrix.row(i);
                println!("  label={} cols={:?} values={:?}", label, cols, values);
            }
        }
        _ => bail!("Unsupported file type: {}", file.display()),
    }
    Ok(())
}
