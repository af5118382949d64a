//! Narrow interfaces to the services around the pipeline
//!
//! The pipeline never talks to object storage or a training service itself.
//! It hands file locations and the feature dimension to these traits. The
//! local implementations here copy files into a directory tree and write job
//! requests as JSON, which is enough to drive and test the whole flow
//! offline.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::TrainingConfig;
use crate::errors::{PipelineError, Result};
use crate::serialization::write_json_document;
use crate::sinks::write_atomic;

/// Uploads a local file under a remote key and returns its URI.
pub trait ObjectUploader {
    fn upload(&self, local: &Path, key: &str) -> Result<String>;
}

/// Accepts a fully specified training job.
pub trait TrainingJobSubmitter {
    /// Returns the name the job was registered under.
    fn submit(&self, request: &TrainingJobRequest) -> Result<String>;
}

/// Supplies environment-dependent settings.
pub trait EnvironmentResolver {
    fn region(&self) -> Option<String>;
    fn execution_role(&self) -> Option<String>;
}

/// Reads region and role from process environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvResolver;

impl EnvironmentResolver for ProcessEnvResolver {
    fn region(&self) -> Option<String> {
        std::env::var("AWS_REGION")
            .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
            .ok()
            .filter(|v| !v.is_empty())
    }

    fn execution_role(&self) -> Option<String> {
        std::env::var("ANIMEREC_EXECUTION_ROLE")
            .ok()
            .filter(|v| !v.is_empty())
    }
}

/// Training settings with every environment-dependent field filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTraining {
    pub settings: TrainingConfig,
    pub region: String,
    pub role: String,
}

/// Fill region and role once, before any job is built.
///
/// Explicit configuration wins over the resolver.
pub fn resolve_training(
    config: &TrainingConfig,
    resolver: &dyn EnvironmentResolver,
) -> Result<ResolvedTraining> {
    let region = config
        .region
        .clone()
        .or_else(|| resolver.region())
        .ok_or_else(|| PipelineError::Config("no region configured or resolvable".to_string()))?;
    let role = config
        .role
        .clone()
        .or_else(|| resolver.execution_role())
        .ok_or_else(|| {
            PipelineError::Config("no execution role configured or resolvable".to_string())
        })?;

    Ok(ResolvedTraining {
        settings: config.clone(),
        region,
        role,
    })
}

/// Everything a training service needs to start a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingJobRequest {
    pub job_name: String,
    pub framework: String,
    pub region: String,
    pub role: String,
    pub instance_count: u32,
    pub instance_type: String,
    pub use_spot_instances: bool,
    pub max_run: u64,
    pub max_wait: u64,
    pub output_uri: String,
    pub checkpoint_uri: String,
    /// Channel name ("train", "test") to data URI
    pub channels: BTreeMap<String, String>,
    pub hyperparameters: BTreeMap<String, String>,
}

impl TrainingJobRequest {
    /// Build a request for the uploaded train/test files.
    ///
    /// `feature_dim` is injected into the hyperparameters so the trainer
    /// sizes its input layer to the encoded feature space.
    pub fn new(
        resolved: &ResolvedTraining,
        train_uri: String,
        test_uri: String,
        feature_dim: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let settings = &resolved.settings;
        let job_name = format!(
            "{}-{}",
            settings.base_job_name,
            now.format("%Y-%m-%d-%H-%M-%S-%3f")
        );
        let base_uri = format!("s3://{}/{}", settings.bucket, settings.prefix);

        let mut channels = BTreeMap::new();
        channels.insert("train".to_string(), train_uri);
        channels.insert("test".to_string(), test_uri);

        let mut hyperparameters = settings.hyperparameters.clone();
        hyperparameters.insert("feature_dim".to_string(), feature_dim.to_string());

        Self {
            job_name: job_name.clone(),
            framework: settings.framework.clone(),
            region: resolved.region.clone(),
            role: resolved.role.clone(),
            instance_count: settings.instance_count,
            instance_type: settings.instance_type.clone(),
            use_spot_instances: settings.use_spot_instances,
            max_run: settings.max_run,
            max_wait: settings.max_wait,
            output_uri: format!("{}/output", base_uri),
            checkpoint_uri: format!("{}/checkpoints/{}", base_uri, job_name),
            channels,
            hyperparameters,
        }
    }
}

/// Object store backed by a local directory: `<root>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ObjectUploader for LocalObjectStore {
    fn upload(&self, local: &Path, key: &str) -> Result<String> {
        let key = key.trim_start_matches('/');
        if key.is_empty() || key.split('/').any(|part| part == "..") {
            return Err(PipelineError::Config(format!("invalid object key '{}'", key)));
        }

        let target = self.root.join(key);
        let content = fs::read(local)?;
        write_atomic(&target, |out| {
            out.write_all(&content)?;
            Ok(())
        })?;

        info!("Uploaded {} -> {}", local.display(), target.display());
        Ok(format!("file://{}", target.display()))
    }
}

/// Submitter that records each request as `<dir>/<job_name>.json`.
#[derive(Debug, Clone)]
pub struct ManifestJobSubmitter {
    dir: PathBuf,
}

impl ManifestJobSubmitter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TrainingJobSubmitter for ManifestJobSubmitter {
    fn submit(&self, request: &TrainingJobRequest) -> Result<String> {
        let path = self.dir.join(format!("{}.json", request.job_name));
        write_atomic(&path, |out| write_json_document(out, request))?;

        info!("Submitted training job {} ({})", request.job_name, path.display());
        Ok(request.job_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    struct FixedResolver;

    impl EnvironmentResolver for FixedResolver {
        fn region(&self) -> Option<String> {
            Some("eu-west-1".to_string())
        }

        fn execution_role(&self) -> Option<String> {
            Some("arn:aws:iam::123456789012:role/trainer".to_string())
        }
    }

    struct EmptyResolver;

    impl EnvironmentResolver for EmptyResolver {
        fn region(&self) -> Option<String> {
            None
        }

        fn execution_role(&self) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_explicit_config_wins() {
        let mut config = TrainingConfig::default();
        config.region = Some("us-east-2".to_string());

        let resolved = resolve_training(&config, &FixedResolver).unwrap();
        assert_eq!(resolved.region, "us-east-2");
        assert_eq!(resolved.role, "arn:aws:iam::123456789012:role/trainer");
    }

    #[test]
    fn test_unresolvable_is_config_error() {
        let err = resolve_training(&TrainingConfig::default(), &EmptyResolver).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_request_injects_feature_dim() {
        let resolved = resolve_training(&TrainingConfig::default(), &FixedResolver).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let request = TrainingJobRequest::new(
            &resolved,
            "file:///store/train.protobuf".to_string(),
            "file:///store/test.protobuf".to_string(),
            47_311,
            now,
        );

        assert_eq!(request.job_name, "anime-recommender-2024-03-09-14-05-07-000");
        assert_eq!(request.hyperparameters.get("feature_dim").map(String::as_str), Some("47311"));
        assert_eq!(request.channels.len(), 2);
        assert_eq!(request.output_uri, "s3://anime-recommender/train-and-inference/output");
    }

    #[test]
    fn test_local_store_and_submitter() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("train.libsvm");
        fs::write(&local, "1 0:1\n").unwrap();

        let store = LocalObjectStore::new(tmp.path().join("bucket"));
        let uri = store.upload(&local, "prefix/train/train.libsvm").unwrap();
        assert!(uri.starts_with("file://"));
        assert_eq!(
            fs::read_to_string(tmp.path().join("bucket/prefix/train/train.libsvm")).unwrap(),
            "1 0:1\n"
        );
        assert!(store.upload(&local, "../escape").is_err());

        let resolved = resolve_training(&TrainingConfig::default(), &FixedResolver).unwrap();
        let request = TrainingJobRequest::new(&resolved, uri.clone(), uri, 2, Utc::now());
        let submitter = ManifestJobSubmitter::new(tmp.path().join("jobs"));
        let name = submitter.submit(&request).unwrap();

        let written = fs::read_to_string(tmp.path().join("jobs").join(format!("{}.json", name))).unwrap();
        let parsed: TrainingJobRequest = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, request);
    }
}
