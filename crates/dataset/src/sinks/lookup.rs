//! Identifier lookup tables
//!
//! One synthetic row per distinct user (item held at the first item) and one
//! per distinct item (user held at the first user), encoded by the fitted
//! encoder and labelled with the raw identifier. Inference reads these to
//! turn a raw identifier into its one-hot column without re-fitting.

use std::path::Path;

use tracing::debug;

use crate::encoder::{OneHotEncoder, SparseMatrix};
use crate::errors::{PipelineError, Result};

use super::libsvm;

/// Encoded rows for every user, labelled by user id.
pub fn user_rows(encoder: &OneHotEncoder) -> Result<(SparseMatrix, Vec<i64>)> {
    let anchor = *encoder
        .items()
        .first()
        .ok_or_else(|| PipelineError::Encoding("encoder has no item categories".to_string()))?;
    let users = encoder.users().to_vec();
    let matrix = encoder.transform_pairs(users.iter().map(|&u| (u, anchor)))?;
    Ok((matrix, users))
}

/// Encoded rows for every item, labelled by item id.
pub fn item_rows(encoder: &OneHotEncoder) -> Result<(SparseMatrix, Vec<i64>)> {
    let anchor = *encoder
        .users()
        .first()
        .ok_or_else(|| PipelineError::Encoding("encoder has no user categories".to_string()))?;
    let items = encoder.items().to_vec();
    let matrix = encoder.transform_pairs(items.iter().map(|&i| (anchor, i)))?;
    Ok((matrix, items))
}

/// Write the user and item lookup files.
pub fn write(encoder: &OneHotEncoder, users_path: &Path, items_path: &Path) -> Result<()> {
    let (matrix, labels) = user_rows(encoder)?;
    libsvm::write(&matrix, &labels, users_path)?;
    debug!("User lookup: {} rows", labels.len());

    let (matrix, labels) = item_rows(encoder)?;
    libsvm::write(&matrix, &labels, items_path)?;
    debug!("Item lookup: {} rows", labels.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::JoinedRecord;
    use std::fs;
    use tempfile::TempDir;

    fn encoder() -> OneHotEncoder {
        let records: Vec<JoinedRecord> = [(7, 300), (3, 100), (7, 200), (5, 100)]
            .iter()
            .map(|&(user_id, item_id)| JoinedRecord {
                rating: 1.0,
                user_id,
                item_id,
                item_name: String::new(),
                genres: String::new(),
                score: None,
            })
            .collect();
        OneHotEncoder::fit(&records).unwrap()
    }

    #[test]
    fn test_user_rows_hold_item_constant() {
        let (matrix, labels) = user_rows(&encoder()).unwrap();
        assert_eq!(labels, vec![3, 5, 7]);
        assert_eq!(matrix.rows(), 3);
        for i in 0..3 {
            let (cols, _) = matrix.row(i);
            assert_eq!(cols, &[i, 3]);
        }
    }

    #[test]
    fn test_item_rows_hold_user_constant() {
        let (matrix, labels) = item_rows(&encoder()).unwrap();
        assert_eq!(labels, vec![100, 200, 300]);
        for i in 0..3 {
            let (cols, _) = matrix.row(i);
            assert_eq!(cols, &[0, 3 + i]);
        }
    }

    #[test]
    fn test_write_files() {
        let tmp = TempDir::new().unwrap();
        let users = tmp.path().join("user_lookup.libsvm");
        let items = tmp.path().join("anime_lookup.libsvm");
        write(&encoder(), &users, &items).unwrap();

        assert_eq!(
            fs::read_to_string(&users).unwrap(),
            "3 0:1 3:1\n5 1:1 3:1\n7 2:1 3:1\n"
        );
        assert_eq!(
            fs::read_to_string(&items).unwrap(),
            "100 0:1 3:1\n200 0:1 4:1\n300 0:1 5:1\n"
        );
    }
}
