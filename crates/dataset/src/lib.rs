//! Anime recommender dataset preparation
//!
//! Turns the packaged ratings archive into training inputs for a sparse
//! factorization trainer, reproducibly:
//!
//! - `archive`: extract once, prune to the two raw tables
//! - `table`: load the raw tables in a fixed order
//! - `join`: inner-join ratings onto item metadata
//! - `split`: seeded permutation and train/test boundary
//! - `encoder`: one-hot (user, item) encoding
//! - `context`: caches permutation, boundary and encoder for one run
//! - `sinks`: CSV, RecordIO-protobuf, libSVM, lookup and manifest writers
//! - `pipeline`: the end-to-end run
//! - `collaborators`: upload and job-submission interfaces

pub mod archive;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod deterministic;
pub mod encoder;
pub mod errors;
pub mod join;
pub mod pipeline;
pub mod schema;
pub mod serialization;
pub mod sinks;
pub mod split;
pub mod table;

pub use archive::{ArchiveMaterializer, RawFileSet};
pub use collaborators::{
    resolve_training, EnvironmentResolver, LocalObjectStore, ManifestJobSubmitter,
    ObjectUploader, ProcessEnvResolver, ResolvedTraining, TrainingJobRequest, TrainingJobSubmitter,
};
pub use config::PipelineConfig;
pub use context::{DatasetContext, TrainTest};
pub use encoder::{EncodedMatrix, EncodedSlice, OneHotEncoder, SparseMatrix};
pub use errors::{PipelineError, Result};
pub use join::{join, JoinedRecord, JoinedTable};
pub use pipeline::{build_context, write_outputs, OutputLayout, Pipeline};
pub use sinks::manifest::ArtifactManifest;
pub use split::{permute, split, PermutedTable, Split};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
