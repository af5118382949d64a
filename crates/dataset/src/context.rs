//! Dataset context: the unit of reproducibility
//!
//! A context owns the joined table, the split configuration and every
//! derived artifact (permutation, boundary, fitted encoder, encoded matrix).
//! Each artifact is computed on first use and cached for the lifetime of the
//! context, so every writer sees the same rows on the same side of the split.

use tracing::{debug, info};

use crate::encoder::{EncodedMatrix, EncodedSlice, OneHotEncoder};
use crate::errors::Result;
use crate::join::JoinedTable;
use crate::split::{permute, split, validate_ratio, PermutedTable, Split};

/// Cached state of one pipeline run.
#[derive(Debug)]
pub struct DatasetContext {
    table: JoinedTable,
    ratio: f64,
    seed: u64,
    permuted: Option<PermutedTable>,
    partition: Option<Split>,
    fitted: Option<Fitted>,
}

#[derive(Debug)]
struct Fitted {
    encoder: OneHotEncoder,
    matrix: EncodedMatrix,
}

/// Train and test blocks of the cached encoding.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainTest {
    pub train: EncodedSlice,
    pub test: EncodedSlice,
    pub partition: Split,
}

impl DatasetContext {
    pub fn new(table: JoinedTable, ratio: f64, seed: u64) -> Result<Self> {
        validate_ratio(ratio)?;
        Ok(Self {
            table,
            ratio,
            seed,
            permuted: None,
            partition: None,
            fitted: None,
        })
    }

    pub fn table(&self) -> &JoinedTable {
        &self.table
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Distinct users plus distinct items of the full joined table.
    pub fn feature_dimension(&self) -> usize {
        self.table.feature_dimension()
    }

    /// The permuted table, drawn once per context.
    pub fn permuted(&mut self) -> &PermutedTable {
        self.permuted.get_or_insert_with(|| {
            debug!("Permuting {} rows with seed {}", self.table.len(), self.seed);
            permute(&self.table, self.seed)
        })
    }

    /// The train/test partition, computed once per context.
    pub fn partition(&mut self) -> Result<Split> {
        if let Some(partition) = &self.partition {
            return Ok(partition.clone());
        }
        let len = self.permuted().len();
        let partition = split(len, self.ratio)?;
        self.partition = Some(partition.clone());
        Ok(partition)
    }

    /// Fit the encoder on the permuted table and encode it, once.
    ///
    /// Later calls return the cached matrix without re-fitting.
    pub fn encoded(&mut self) -> Result<&EncodedMatrix> {
        Ok(&self.fitted()?.matrix)
    }

    /// The encoder fitted by [`DatasetContext::encoded`].
    pub fn encoder(&mut self) -> Result<&OneHotEncoder> {
        Ok(&self.fitted()?.encoder)
    }

    fn fitted(&mut self) -> Result<&Fitted> {
        let fitted = match self.fitted.take() {
            Some(fitted) => fitted,
            None => self.fit()?,
        };
        Ok(self.fitted.insert(fitted))
    }

    fn fit(&mut self) -> Result<Fitted> {
        info!("One-hot encoding @on_job_start");
        let permuted = self.permuted();
        let encoder = OneHotEncoder::fit(&permuted.records)?;
        let features = encoder.transform(&permuted.records)?;
        let targets = permuted.records.iter().map(|r| r.rating).collect();
        debug!(
            "Encoded {} rows into {} columns ({} non-zeros)",
            features.rows(),
            features.cols,
            features.nnz()
        );
        info!("One-hot encoding @on_job_end");
        Ok(Fitted {
            encoder,
            matrix: EncodedMatrix { features, targets },
        })
    }

    /// Slice the cached encoding at the cached boundary.
    pub fn train_test(&mut self) -> Result<TrainTest> {
        let partition = self.partition()?;
        let encoded = self.encoded()?;
        Ok(TrainTest {
            train: encoded.slice(partition.train()),
            test: encoded.slice(partition.test()),
            partition,
        })
    }
}
