//! Archive materialization
//!
//! Unpacks the dataset archive once and prunes the destination down to the
//! two raw tables the pipeline reads.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::{PipelineError, Result};
use crate::schema::{RAW_FILES, SUPPLEMENTARY_DIR};

/// Location of the retained raw tables after extraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFileSet {
    pub dir: PathBuf,
}

impl RawFileSet {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of a retained file inside the raw directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

/// Extracts an archive into a destination exactly once.
#[derive(Debug)]
pub struct ArchiveMaterializer {
    archive: PathBuf,
    destination: PathBuf,
    extracted: bool,
}

impl ArchiveMaterializer {
    pub fn new(archive: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            destination: destination.into(),
            extracted: false,
        }
    }

    /// Treat `destination` as already materialized; `extract` becomes a no-op.
    pub fn assume_extracted(destination: impl Into<PathBuf>) -> Result<Self> {
        let destination = destination.into();
        if !destination.is_dir() {
            return Err(PipelineError::Extraction(format!(
                "raw directory '{}' doesn't exist",
                destination.display()
            )));
        }
        Ok(Self {
            archive: PathBuf::new(),
            destination,
            extracted: true,
        })
    }

    pub fn is_extracted(&self) -> bool {
        self.extracted
    }

    /// Unpack the archive and apply the retention policy.
    pub fn extract(&mut self) -> Result<RawFileSet> {
        if self.extracted {
            debug!("Archive already extracted into {}", self.destination.display());
            return Ok(RawFileSet::new(&self.destination));
        }

        info!("Unpacking Archive @on_job_start");
        unpack(&self.archive, &self.destination)?;
        prune(&self.destination)?;
        self.extracted = true;
        info!("Unpacking Archive @on_job_end");

        Ok(RawFileSet::new(&self.destination))
    }
}

fn unpack(archive: &Path, destination: &Path) -> Result<()> {
    if !archive.is_file() {
        return Err(PipelineError::Extraction(format!(
            "archive '{}' does not exist",
            archive.display()
        )));
    }

    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|err| {
        PipelineError::Extraction(format!("'{}' is not a zip archive: {}", archive.display(), err))
    })?;

    fs::create_dir_all(destination)?;
    zip.extract(destination).map_err(|err| {
        PipelineError::Extraction(format!("failed to unpack '{}': {}", archive.display(), err))
    })?;

    debug!("Unpacked {} entries into {}", zip.len(), destination.display());
    Ok(())
}

/// Remove every entry of `dir` that is not one of the retained raw files.
///
/// Entries are visited in sorted order so the log output is stable.
fn prune(dir: &Path) -> Result<()> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    for path in entries {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        if RAW_FILES.contains(&name.as_str()) && path.is_file() {
            continue;
        }

        if path.is_dir() {
            if name == SUPPLEMENTARY_DIR {
                debug!("Remove tree {}", name);
            } else {
                debug!("Remove unexpected directory {}", name);
            }
            fs::remove_dir_all(&path)?;
        } else {
            debug!("Unlink file {}", name);
            fs::remove_file(&path)?;
        }
    }

    Ok(())
}
