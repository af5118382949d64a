//! Error types for the dataset pipeline

use thiserror::Error;

/// Errors returned by the dataset pipeline.
///
/// Validation failures (`Config`) are configuration mistakes and are never
/// retried. Nothing in this crate retries on any variant.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Archive missing or not a readable zip container
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Raw table missing or malformed
    #[error("load error: {0}")]
    Load(String),

    /// Out-of-range ratio, unsupported extension or invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Encoder input rejected
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Filesystem failure while reading or writing artifacts
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
