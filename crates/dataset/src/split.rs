//! Seeded permutation and train/test partitioning

use std::ops::Range;

use tracing::debug;

use crate::deterministic::permutation;
use crate::errors::{PipelineError, Result};
use crate::join::{JoinedRecord, JoinedTable};

/// A joined table reordered by a seeded permutation.
#[derive(Clone, Debug, PartialEq)]
pub struct PermutedTable {
    /// `order[i]` is the joined-table row placed at position `i`
    pub order: Vec<usize>,
    pub records: Vec<JoinedRecord>,
    pub seed: u64,
}

impl PermutedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn rows(&self, range: Range<usize>) -> &[JoinedRecord] {
        &self.records[range]
    }

    /// Train slice, test slice and the partition they came from.
    pub fn split(&self, ratio: f64) -> Result<(&[JoinedRecord], &[JoinedRecord], Split)> {
        let partition = split(self.len(), ratio)?;
        Ok((
            self.rows(partition.train()),
            self.rows(partition.test()),
            partition,
        ))
    }
}

/// Partition of a permuted table into a train prefix and test suffix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Split {
    pub boundary: usize,
    pub len: usize,
}

impl Split {
    pub fn train(&self) -> Range<usize> {
        0..self.boundary
    }

    pub fn test(&self) -> Range<usize> {
        self.boundary..self.len
    }
}

/// Reorder `table` with the permutation drawn for `seed`.
pub fn permute(table: &JoinedTable, seed: u64) -> PermutedTable {
    let order = permutation(table.len(), seed);
    let records = order.iter().map(|&i| table.records[i].clone()).collect();
    PermutedTable {
        order,
        records,
        seed,
    }
}

/// Check that a train ratio lies in `(0.0, 1.0]`.
pub fn validate_ratio(ratio: f64) -> Result<()> {
    if ratio.is_finite() && ratio > 0.0 && ratio <= 1.0 {
        Ok(())
    } else {
        Err(PipelineError::Config(format!(
            "train split ratio must be in (0, 1], got {}",
            ratio
        )))
    }
}

/// Compute the train/test boundary `floor(len * ratio)`.
pub fn split(len: usize, ratio: f64) -> Result<Split> {
    validate_ratio(ratio)?;
    let boundary = ((len as f64) * ratio).floor() as usize;
    let boundary = boundary.min(len);

    debug!(
        "Dataset split: {} training, {} test (ratio {})",
        boundary,
        len - boundary,
        ratio
    );
    Ok(Split { boundary, len })
}
