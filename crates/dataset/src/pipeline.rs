//! End-to-end preparation run
//!
//! ```text
//! archive ─► raw tables ─► joined table ─► DatasetContext ─► outputs
//! ```
//!
//! All format writers read the permutation, boundary and encoding cached on
//! the one context built per run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::archive::{ArchiveMaterializer, RawFileSet};
use crate::config::PipelineConfig;
use crate::context::DatasetContext;
use crate::errors::Result;
use crate::join::join;
use crate::schema::outputs;
use crate::sinks::manifest::{ArtifactDigest, ArtifactManifest};
use crate::sinks::{delimited, libsvm, lookup, recordio};
use crate::table;

/// Locations of every artifact inside an output directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLayout {
    pub dir: PathBuf,
    pub joined: PathBuf,
}

impl OutputLayout {
    pub fn new(dir: impl Into<PathBuf>, joined_filename: &str) -> Self {
        let dir = dir.into();
        Self {
            joined: dir.join(joined_filename),
            dir,
        }
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn dimension(&self) -> PathBuf {
        self.file(outputs::DIMENSION)
    }

    pub fn manifest(&self) -> PathBuf {
        self.file(outputs::MANIFEST)
    }
}

/// Load the raw tables and build a context over their join.
pub fn build_context(
    raw: &RawFileSet,
    type_filter: Option<&str>,
    ratio: f64,
    seed: u64,
) -> Result<DatasetContext> {
    let (items, ratings) = table::load(raw)?;
    let joined = join(&items, &ratings, type_filter)?;
    DatasetContext::new(joined, ratio, seed)
}

/// Write every artifact from `ctx` into `layout`.
pub fn write_outputs(
    ctx: &mut DatasetContext,
    layout: &OutputLayout,
    type_filter: Option<&str>,
) -> Result<ArtifactManifest> {
    let mut written: Vec<(&str, PathBuf)> = Vec::new();

    info!("Save Join Table to CSV @on_job_start");
    delimited::write_joined(&ctx.table().records, &layout.joined)?;
    delimited::write_dimension(ctx.feature_dimension(), &layout.dimension())?;
    written.push(("joined", layout.joined.clone()));
    written.push(("dimension", layout.dimension()));
    info!("Save Join Table to CSV @on_job_end");

    let partition = ctx.partition()?;

    info!("Save Split CSV @on_job_start");
    let permuted = ctx.permuted();
    let train_csv = layout.file(outputs::TRAIN_CSV);
    let test_csv = layout.file(outputs::TEST_CSV);
    delimited::write_pairs(permuted.rows(partition.train()), &train_csv)?;
    delimited::write_pairs(permuted.rows(partition.test()), &test_csv)?;
    written.push(("train_csv", train_csv));
    written.push(("test_csv", test_csv));
    info!("Save Split CSV @on_job_end");

    let split = ctx.train_test()?;

    info!("Save RecordIO-protobuf @on_job_start");
    let train_rec = layout.file(outputs::TRAIN_RECORDIO);
    let test_rec = layout.file(outputs::TEST_RECORDIO);
    recordio::write(&split.train.features, &split.train.targets, &train_rec)?;
    recordio::write(&split.test.features, &split.test.targets, &test_rec)?;
    written.push(("train_recordio", train_rec));
    written.push(("test_recordio", test_rec));
    info!("Save RecordIO-protobuf @on_job_end");

    info!("Save libSVM @on_job_start");
    let train_svm = layout.file(outputs::TRAIN_LIBSVM);
    let test_svm = layout.file(outputs::TEST_LIBSVM);
    libsvm::write(&split.train.features, &split.train.targets, &train_svm)?;
    libsvm::write(&split.test.features, &split.test.targets, &test_svm)?;
    written.push(("train_libsvm", train_svm));
    written.push(("test_libsvm", test_svm));
    info!("Save libSVM @on_job_end");

    info!("Save Lookups @on_job_start");
    let users = layout.file(outputs::USER_LOOKUP);
    let items = layout.file(outputs::ITEM_LOOKUP);
    lookup::write(ctx.encoder()?, &users, &items)?;
    written.push(("user_lookup", users));
    written.push(("anime_lookup", items));
    info!("Save Lookups @on_job_end");

    let mut artifacts = BTreeMap::new();
    for (key, path) in &written {
        artifacts.insert(key.to_string(), ArtifactDigest::of(path)?);
    }

    let manifest = ArtifactManifest {
        seed: ctx.seed(),
        ratio: ctx.ratio(),
        type_filter: type_filter.map(str::to_string),
        joined_rows: ctx.table().len(),
        train_rows: split.train.targets.len(),
        test_rows: split.test.targets.len(),
        feature_dimension: ctx.feature_dimension(),
        artifacts,
    };
    manifest.write(&layout.manifest())?;
    Ok(manifest)
}

/// Configured preparation run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.config.paths.output_dir, &self.config.dataset.joined_filename)
    }

    /// Unpack the archive into the raw directory.
    pub fn extract(&self) -> Result<RawFileSet> {
        ArchiveMaterializer::new(&self.config.paths.archive, &self.config.paths.raw_dir).extract()
    }

    /// Run every stage. With `skip_extract`, the raw directory must already
    /// hold the two tables.
    pub fn run(&self, skip_extract: bool) -> Result<ArtifactManifest> {
        let mut materializer = if skip_extract {
            ArchiveMaterializer::assume_extracted(&self.config.paths.raw_dir)?
        } else {
            ArchiveMaterializer::new(&self.config.paths.archive, &self.config.paths.raw_dir)
        };
        let raw = materializer.extract()?;

        let type_filter = self.config.dataset.type_filter.as_deref();
        let mut ctx = build_context(
            &raw,
            type_filter,
            self.config.split.ratio,
            self.config.split.seed,
        )?;
        info!(
            "Prepared {} joined rows (seed {}, ratio {})",
            ctx.table().len(),
            ctx.seed(),
            ctx.ratio()
        );

        write_outputs(&mut ctx, &self.layout(), type_filter)
    }
}

/// Read the feature dimension written by a previous run.
pub fn read_dimension(layout: &OutputLayout) -> Result<usize> {
    delimited::read_dimension(&layout.dimension())
}

/// Whether `dir` already holds a manifest from a previous run.
pub fn has_outputs(dir: &Path) -> bool {
    dir.join(outputs::MANIFEST).is_file()
}
