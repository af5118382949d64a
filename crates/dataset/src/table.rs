//! Raw table loading
//!
//! Reads the item and ratings CSV files into untyped, column-addressable
//! tables. Files are opened by name in a fixed order, never by iterating the
//! raw directory.

use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info};

use crate::archive::RawFileSet;
use crate::errors::{PipelineError, Result};
use crate::schema::{ITEMS_FILE, RATINGS_FILE};

/// An ordered table of text cells loaded from one CSV file.
#[derive(Clone, Debug)]
pub struct RawTable {
    pub name: String,
    headers: StringRecord,
    records: Vec<StringRecord>,
}

impl RawTable {
    /// Read a headed CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PipelineError::Load(format!(
                "required table '{}' is missing",
                path.display()
            )));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|err| load_error(path, err))?;

        let headers = reader.headers().map_err(|err| load_error(path, err))?.clone();
        if headers.is_empty() {
            return Err(PipelineError::Load(format!(
                "table '{}' has no header row",
                path.display()
            )));
        }

        let records = reader
            .records()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| load_error(path, err))?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!("Loaded {} rows from {}", records.len(), name);
        Ok(Self {
            name,
            headers,
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of a named column.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| {
                PipelineError::Load(format!("table '{}' has no column '{}'", self.name, name))
            })
    }

    /// Cell at (`row`, `column`), trimmed.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.records[row].get(column).unwrap_or_default().trim()
    }
}

fn load_error(path: &Path, err: csv::Error) -> PipelineError {
    PipelineError::Load(format!("failed to parse '{}': {}", path.display(), err))
}

/// Load the item metadata and ratings tables, in that order.
pub fn load(raw: &RawFileSet) -> Result<(RawTable, RawTable)> {
    info!("Load Tables @on_job_start");
    let items = RawTable::from_csv(raw.path(ITEMS_FILE))?;
    let ratings = RawTable::from_csv(raw.path(RATINGS_FILE))?;
    info!("Load Tables @on_job_end");
    Ok((items, ratings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_fixed_order() {
        let tmp = TempDir::new().unwrap();
        // Written in reverse so creation order differs from load order.
        fs::write(tmp.path().join(RATINGS_FILE), "user_id,anime_id,rating\n1,5,7\n2,5,8\n").unwrap();
        fs::write(tmp.path().join(ITEMS_FILE), "MAL_ID,Name\n5,Bebop\n").unwrap();

        let (items, ratings) = load(&RawFileSet::new(tmp.path())).unwrap();
        assert_eq!(items.name, ITEMS_FILE);
        assert_eq!(items.len(), 1);
        assert_eq!(ratings.name, RATINGS_FILE);
        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings.cell(1, ratings.column("rating").unwrap()), "8");
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(ITEMS_FILE), "MAL_ID,Name\n5,Bebop\n").unwrap();

        let err = load(&RawFileSet::new(tmp.path())).unwrap_err();
        assert!(matches!(err, PipelineError::Load(_)));
    }

    #[test]
    fn test_ragged_rows_are_load_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.csv");
        fs::write(&path, "a,b\n1,2\n3\n").unwrap();

        assert!(matches!(RawTable::from_csv(&path), Err(PipelineError::Load(_))));
    }

    #[test]
    fn test_quoted_cells() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("items.csv");
        fs::write(&path, "MAL_ID,Genres\n1,\"Action, Drama\"\n").unwrap();

        let table = RawTable::from_csv(&path).unwrap();
        assert_eq!(table.cell(0, table.column("Genres").unwrap()), "Action, Drama");
        assert!(table.column("Score").is_err());
    }
}
