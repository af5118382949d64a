//! Artifact manifest: what a run wrote and the BLAKE3 digest of each file.
//!
//! Two runs over the same raw tables with the same seed and ratio produce
//! byte-identical manifests.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, Result};
use crate::serialization::write_json_document;

use super::write_atomic;

/// Digest of one written file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDigest {
    pub file: String,
    pub bytes: u64,
    pub blake3: String,
}

impl ArtifactDigest {
    pub fn of(path: &Path) -> Result<Self> {
        let content = std::fs::read(path)?;
        Ok(Self {
            file: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            bytes: content.len() as u64,
            blake3: hex::encode(blake3::hash(&content).as_bytes()),
        })
    }
}

/// Summary of one pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub seed: u64,
    pub ratio: f64,
    pub type_filter: Option<String>,
    pub joined_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub feature_dimension: usize,
    pub artifacts: BTreeMap<String, ArtifactDigest>,
}

impl ArtifactManifest {
    pub fn write(&self, path: &Path) -> Result<()> {
        write_atomic(path, |out| write_json_document(out, self))
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|err| PipelineError::Load(format!("{}: {}", path.display(), err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_digest_and_round_trip() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("train.libsvm");
        fs::write(&data, "9 0:1 4:1\n").unwrap();

        let digest = ArtifactDigest::of(&data).unwrap();
        assert_eq!(digest.file, "train.libsvm");
        assert_eq!(digest.bytes, 10);
        assert_eq!(digest.blake3.len(), 64);

        let mut artifacts = BTreeMap::new();
        artifacts.insert("train_libsvm".to_string(), digest);
        let manifest = ArtifactManifest {
            seed: 42,
            ratio: 0.7,
            type_filter: None,
            joined_rows: 1,
            train_rows: 1,
            test_rows: 0,
            feature_dimension: 2,
            artifacts,
        };

        let path = tmp.path().join("manifest.json");
        manifest.write(&path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().ends_with("}\n"));
        assert_eq!(ArtifactManifest::read(&path).unwrap(), manifest);
    }
}
