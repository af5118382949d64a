//! Pipeline configuration
//!
//! Loaded from TOML, then overridden from `ANIMEREC_*` environment variables.
//! Values that depend on the execution environment (region, execution role)
//! are not looked up here; see [`crate::collaborators::resolve_training`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{PipelineError, Result};
use crate::schema::outputs;
use crate::sinks::delimited::ensure_csv;
use crate::split::validate_ratio;

/// Full configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub split: SplitConfig,
    pub dataset: DatasetConfig,
    pub training: TrainingConfig,
}

/// Input and output locations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Packaged dataset archive
    pub archive: PathBuf,
    /// Directory holding the two retained raw tables
    pub raw_dir: PathBuf,
    /// Directory receiving every artifact
    pub output_dir: PathBuf,
}

/// Reproducible split parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    /// Train fraction in (0, 1]
    pub ratio: f64,
    pub seed: u64,
}

/// Dataset selection and export naming
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatasetConfig {
    /// Keep only items of this type (e.g. `TV`)
    pub type_filter: Option<String>,
    /// Name of the joined export, must end in `.csv`
    pub joined_filename: String,
}

/// Training job settings handed to the job submitter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    pub framework: String,
    pub base_job_name: String,
    pub instance_count: u32,
    pub instance_type: String,
    pub use_spot_instances: bool,
    /// Seconds
    pub max_run: u64,
    /// Seconds, must be >= max_run when spot instances are used
    pub max_wait: u64,
    pub bucket: String,
    pub prefix: String,
    /// Explicit region; resolved from the environment when absent
    pub region: Option<String>,
    /// Explicit execution role; resolved from the environment when absent
    pub role: Option<String>,
    pub hyperparameters: BTreeMap<String, String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let data = PathBuf::from("data");
        Self {
            archive: data.join("archive.zip"),
            raw_dir: data.join("raw"),
            output_dir: data.join("train-and-inference"),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            ratio: 0.7,
            seed: 42,
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            type_filter: None,
            joined_filename: outputs::DEFAULT_JOINED.to_string(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let mut hyperparameters = BTreeMap::new();
        hyperparameters.insert("num_factors".to_string(), "64".to_string());
        hyperparameters.insert("predictor_type".to_string(), "regressor".to_string());
        hyperparameters.insert("mini_batch_size".to_string(), "1000".to_string());
        hyperparameters.insert("epochs".to_string(), "10".to_string());

        Self {
            framework: "factorization-machines".to_string(),
            base_job_name: "anime-recommender".to_string(),
            instance_count: 1,
            instance_type: "ml.c5.xlarge".to_string(),
            use_spot_instances: true,
            max_run: 3600,
            max_wait: 7200,
            bucket: "anime-recommender".to_string(),
            prefix: "train-and-inference".to_string(),
            region: None,
            role: None,
            hyperparameters,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("failed to read config file '{}': {}", path.display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("failed to parse config: {}", e)))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the process environment in
    /// production, a map in tests)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("ANIMEREC_SPLIT_RATIO") {
            self.split.ratio = val.parse().map_err(|_| {
                PipelineError::Config(format!("ANIMEREC_SPLIT_RATIO is not a number: '{}'", val))
            })?;
        }

        if let Some(val) = lookup("ANIMEREC_SPLIT_SEED") {
            self.split.seed = val.parse().map_err(|_| {
                PipelineError::Config(format!("ANIMEREC_SPLIT_SEED is not an integer: '{}'", val))
            })?;
        }

        if let Some(val) = lookup("ANIMEREC_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(val);
        }

        if let Some(val) = lookup("ANIMEREC_TYPE_FILTER") {
            self.dataset.type_filter = if val.is_empty() { None } else { Some(val) };
        }

        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        validate_ratio(self.split.ratio)?;
        ensure_csv(Path::new(&self.dataset.joined_filename))?;

        if self.training.instance_count == 0 {
            return Err(PipelineError::Config("training.instance_count must be > 0".to_string()));
        }
        if self.training.use_spot_instances && self.training.max_wait < self.training.max_run {
            return Err(PipelineError::Config(
                "training.max_wait must be >= training.max_run for spot instances".to_string(),
            ));
        }
        Ok(())
    }
}
