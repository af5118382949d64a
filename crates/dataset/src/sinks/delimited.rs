//! Delimited-text outputs: joined export, feature dimension, split pairs

use std::io::Write;
use std::path::Path;

use crate::errors::{PipelineError, Result};
use crate::join::JoinedRecord;
use crate::schema::joined;

use super::write_atomic;

/// Reject output names that are not `.csv`.
pub fn ensure_csv(path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => Ok(()),
        _ => Err(PipelineError::Config(format!(
            "unsupported output extension for '{}', expected .csv",
            path.display()
        ))),
    }
}

fn csv_error(err: csv::Error) -> PipelineError {
    match err.into_kind() {
        csv::ErrorKind::Io(io) => PipelineError::Io(io),
        other => PipelineError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("{:?}", other),
        )),
    }
}

/// Write `anime_id, anime, genres` for every joined row, for the inference
/// side to map predictions back to titles.
pub fn write_joined(records: &[JoinedRecord], path: &Path) -> Result<()> {
    ensure_csv(path)?;
    write_atomic(path, |out| {
        let mut writer = csv::Writer::from_writer(out);
        writer
            .write_record([joined::ITEM_ID, joined::ITEM_NAME, joined::GENRES])
            .map_err(csv_error)?;
        for record in records {
            writer
                .write_record([
                    record.item_id.to_string().as_str(),
                    record.item_name.as_str(),
                    record.genres.as_str(),
                ])
                .map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(())
    })
}

/// Write the feature dimension as a bare decimal.
pub fn write_dimension(dimension: usize, path: &Path) -> Result<()> {
    write_atomic(path, |out| {
        write!(out, "{}", dimension)?;
        Ok(())
    })
}

/// Read a dimension file written by [`write_dimension`].
pub fn read_dimension(path: &Path) -> Result<usize> {
    let raw = std::fs::read_to_string(path)?;
    raw.trim().parse::<usize>().map_err(|_| {
        PipelineError::Load(format!("'{}' does not hold a dimension: '{}'", path.display(), raw))
    })
}

/// Write `user_id, anime_id` pairs of one split.
pub fn write_pairs(records: &[JoinedRecord], path: &Path) -> Result<()> {
    ensure_csv(path)?;
    write_atomic(path, |out| {
        let mut writer = csv::Writer::from_writer(out);
        writer
            .write_record([joined::USER_ID, joined::ITEM_ID])
            .map_err(csv_error)?;
        for record in records {
            writer
                .write_record([record.user_id.to_string(), record.item_id.to_string()])
                .map_err(csv_error)?;
        }
        writer.flush()?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn record(user_id: i64, item_id: i64, name: &str, genres: &str) -> JoinedRecord {
        JoinedRecord {
            rating: 8.0,
            user_id,
            item_id,
            item_name: name.to_string(),
            genres: genres.to_string(),
            score: Some(8.5),
        }
    }

    #[test]
    fn test_joined_export_columns() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("anime-genre.csv");
        let rows = vec![record(1, 20, "Naruto", "Action, Comedy")];

        write_joined(&rows, &path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "anime_id,anime,genres\n20,Naruto,\"Action, Comedy\"\n"
        );
    }

    #[test]
    fn test_rejects_non_csv() {
        let tmp = TempDir::new().unwrap();
        let err = write_joined(&[], &tmp.path().join("anime.parquet")).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(!tmp.path().join("anime.parquet").exists());
    }

    #[test]
    fn test_dimension_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("dimension.txt");
        write_dimension(47_311, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "47311");
        assert_eq!(read_dimension(&path).unwrap(), 47_311);
    }

    #[test]
    fn test_pairs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("train.csv");
        write_pairs(&[record(3, 9, "", ""), record(4, 1, "", "")], &path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "user_id,anime_id\n3,9\n4,1\n"
        );
    }
}
