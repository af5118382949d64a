//! Output writers
//!
//! Every writer renders into a temporary file next to its destination and
//! renames it into place once complete, so a failed write never leaves a
//! truncated file under the final name and never touches sibling outputs.

pub mod delimited;
pub mod libsvm;
pub mod lookup;
pub mod manifest;
pub mod recordio;

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::errors::{PipelineError, Result};

/// Write `path` through `body`, creating the parent directory on demand.
pub fn write_atomic<F>(path: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        body(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| PipelineError::Io(err.error))?;

    tracing::debug!("Wrote {}", path.display());
    Ok(())
}
