//! libSVM sparse text: `label index:value index:value ...`, zero-based indices

use std::fmt::Display;
use std::str::FromStr;
use std::io::Write;
use std::path::Path;

use crate::encoder::SparseMatrix;
use crate::errors::{PipelineError, Result};

use super::write_atomic;

/// Write one line per matrix row, labelled by the matching entry of `labels`.
pub fn write<L: Display>(features: &SparseMatrix, labels: &[L], path: &Path) -> Result<()> {
    if features.rows() != labels.len() {
        return Err(PipelineError::Encoding(format!(
            "{} feature rows but {} labels",
            features.rows(),
            labels.len()
        )));
    }

    write_atomic(path, |out| {
        for (i, label) in labels.iter().enumerate() {
            write!(out, "{}", label)?;
            let (cols, values) = features.row(i);
            for (col, value) in cols.iter().zip(values) {
                write!(out, " {}:{}", col, value)?;
            }
            writeln!(out)?;
        }
        Ok(())
    })
}

/// Parse a libSVM file back into a matrix of `cols` columns and its rating
/// labels.
pub fn read(path: &Path, cols: usize) -> Result<(SparseMatrix, Vec<f32>)> {
    read_labeled(path, cols)
}

/// Like [`read`], parsing labels as `L`. Lookup files carry raw `i64`
/// identifiers that do not survive a round trip through `f32`.
pub fn read_labeled<L: FromStr>(path: &Path, cols: usize) -> Result<(SparseMatrix, Vec<L>)> {
    let content = std::fs::read_to_string(path)?;
    let mut matrix = SparseMatrix::new(cols);
    let mut labels = Vec::new();

    for (line_idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut parts = line.split_whitespace();
        let label = parts
            .next()
            .and_then(|raw| raw.parse::<L>().ok())
            .ok_or_else(|| parse_error(path, line_idx, "invalid label"))?;

        let mut row = Vec::new();
        for part in parts {
            let (col, value) = part
                .split_once(':')
                .ok_or_else(|| parse_error(path, line_idx, "expected index:value"))?;
            let col = col
                .parse::<usize>()
                .map_err(|_| parse_error(path, line_idx, "invalid index"))?;
            let value = value
                .parse::<f32>()
                .map_err(|_| parse_error(path, line_idx, "invalid value"))?;
            if col >= cols {
                return Err(parse_error(path, line_idx, "index outside feature space"));
            }
            row.push((col, value));
        }

        matrix.push_row(&row);
        labels.push(label);
    }

    Ok((matrix, labels))
}

fn parse_error(path: &Path, line_idx: usize, what: &str) -> PipelineError {
    PipelineError::Load(format!("{} line {}: {}", path.display(), line_idx + 1, what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sample() -> SparseMatrix {
        let mut m = SparseMatrix::new(6);
        m.push_row(&[(0, 1.0), (4, 1.0)]);
        m.push_row(&[(2, 1.0), (5, 1.0)]);
        m.push_row(&[(1, 1.0), (3, 0.5)]);
        m
    }

    #[test]
    fn test_line_format() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("train.libsvm");
        write(&sample(), &[9.0f32, 7.5, 10.0], &path).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "9 0:1 4:1\n7.5 2:1 5:1\n10 1:1 3:0.5\n"
        );
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("test.libsvm");
        let matrix = sample();
        let labels = vec![9.0f32, 7.5, 10.0];

        write(&matrix, &labels, &path).unwrap();
        let (parsed, parsed_labels) = read(&path, 6).unwrap();

        assert_eq!(parsed, matrix);
        assert_eq!(parsed_labels, labels);
    }

    #[test]
    fn test_integer_labels() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("lookup.libsvm");
        let mut m = SparseMatrix::new(3);
        m.push_row(&[(0, 1.0), (2, 1.0)]);
        write(&m, &[353_405i64], &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "353405 0:1 2:1\n");
    }

    #[test]
    fn test_large_identifier_labels_survive() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("anime_lookup.libsvm");
        let mut m = SparseMatrix::new(3);
        m.push_row(&[(0, 1.0), (2, 1.0)]);
        write(&m, &[16_777_217i64], &path).unwrap();

        let (_, labels) = read_labeled::<i64>(&path, 3).unwrap();
        assert_eq!(labels, vec![16_777_217]);

        let (_, wide) = read_labeled::<f64>(&path, 3).unwrap();
        assert_eq!(wide, vec![16_777_217.0]);
    }

    #[test]
    fn test_label_count_mismatch() {
        let tmp = TempDir::new().unwrap();
        let err = write(&sample(), &[1.0f32], &tmp.path().join("x.libsvm")).unwrap_err();
        assert!(matches!(err, PipelineError::Encoding(_)));
    }

    #[test]
    fn test_read_rejects_out_of_range_index() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.libsvm");
        fs::write(&path, "1 0:1 9:1\n").unwrap();
        assert!(matches!(read(&path, 6), Err(PipelineError::Load(_))));
    }
}
