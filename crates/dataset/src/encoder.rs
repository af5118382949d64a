//! One-hot encoding of the (user, item) identifier pair
//!
//! Columns are laid out as all user categories (ascending) followed by all
//! item categories (ascending), so column `i < users` is a user and the rest
//! are items.

use std::ops::Range;

use crate::errors::{PipelineError, Result};
use crate::join::JoinedRecord;

/// Compressed sparse row matrix of `f32` values.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrix {
    pub indptr: Vec<usize>,
    pub indices: Vec<usize>,
    pub values: Vec<f32>,
    pub cols: usize,
}

impl SparseMatrix {
    pub fn new(cols: usize) -> Self {
        Self {
            indptr: vec![0],
            indices: Vec::new(),
            values: Vec::new(),
            cols,
        }
    }

    /// Append one row given as (column, value) pairs in column order.
    pub fn push_row(&mut self, entries: &[(usize, f32)]) {
        for &(col, value) in entries {
            self.indices.push(col);
            self.values.push(value);
        }
        self.indptr.push(self.indices.len());
    }

    pub fn rows(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Non-zero columns and values of row `i`.
    pub fn row(&self, i: usize) -> (&[usize], &[f32]) {
        let span = self.indptr[i]..self.indptr[i + 1];
        (&self.indices[span.clone()], &self.values[span])
    }

    /// Copy a contiguous block of rows into a new matrix.
    pub fn slice_rows(&self, range: Range<usize>) -> SparseMatrix {
        let start = self.indptr[range.start];
        let end = self.indptr[range.end];
        SparseMatrix {
            indptr: self.indptr[range.start..=range.end]
                .iter()
                .map(|p| p - start)
                .collect(),
            indices: self.indices[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
            cols: self.cols,
        }
    }
}

impl Default for SparseMatrix {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Fitted one-hot encoder over user and item identifiers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OneHotEncoder {
    users: Vec<i64>,
    items: Vec<i64>,
}

impl OneHotEncoder {
    /// Learn the sorted category lists from `records`.
    pub fn fit(records: &[JoinedRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(PipelineError::Encoding(
                "cannot fit encoder on an empty table".to_string(),
            ));
        }

        let mut users: Vec<i64> = records.iter().map(|r| r.user_id).collect();
        users.sort_unstable();
        users.dedup();

        let mut items: Vec<i64> = records.iter().map(|r| r.item_id).collect();
        items.sort_unstable();
        items.dedup();

        Ok(Self { users, items })
    }

    pub fn users(&self) -> &[i64] {
        &self.users
    }

    pub fn items(&self) -> &[i64] {
        &self.items
    }

    /// Total one-hot width.
    pub fn dimension(&self) -> usize {
        self.users.len() + self.items.len()
    }

    pub fn user_column(&self, user_id: i64) -> Option<usize> {
        self.users.binary_search(&user_id).ok()
    }

    pub fn item_column(&self, item_id: i64) -> Option<usize> {
        self.items
            .binary_search(&item_id)
            .ok()
            .map(|i| self.users.len() + i)
    }

    /// Encode `(user_id, item_id)` pairs; unseen identifiers are rejected.
    pub fn transform_pairs<I>(&self, pairs: I) -> Result<SparseMatrix>
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        let mut matrix = SparseMatrix::new(self.dimension());
        for (user_id, item_id) in pairs {
            let user = self.user_column(user_id).ok_or_else(|| {
                PipelineError::Encoding(format!("unknown user_id {}", user_id))
            })?;
            let item = self.item_column(item_id).ok_or_else(|| {
                PipelineError::Encoding(format!("unknown anime_id {}", item_id))
            })?;
            matrix.push_row(&[(user, 1.0), (item, 1.0)]);
        }
        Ok(matrix)
    }

    /// Encode a slice of joined rows.
    pub fn transform(&self, records: &[JoinedRecord]) -> Result<SparseMatrix> {
        self.transform_pairs(records.iter().map(|r| (r.user_id, r.item_id)))
    }
}

/// Encoded feature matrix paired with its rating targets.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedMatrix {
    pub features: SparseMatrix,
    pub targets: Vec<f32>,
}

impl EncodedMatrix {
    pub fn slice(&self, range: Range<usize>) -> EncodedSlice {
        EncodedSlice {
            features: self.features.slice_rows(range.clone()),
            targets: self.targets[range].to_vec(),
        }
    }
}

/// A contiguous block of rows cut from an [`EncodedMatrix`].
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedSlice {
    pub features: SparseMatrix,
    pub targets: Vec<f32>,
}
