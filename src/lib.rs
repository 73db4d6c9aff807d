pub mod config;
pub mod error;
pub mod ingestion;
pub mod keys;
pub mod locks;
pub mod pipeline;
pub mod processing;
pub mod storage;

pub use config::{CsvOptions, PipelineConfig};
pub use error::{PipelineError, Result};
pub use ingestion::{BatchLoader, BatchMetadata, IngestReport, SkippedFile, TableSet};
pub use pipeline::{BatchPipeline, PipelineOutcome};
pub use processing::{BatchProcessor, IdentityTransform, TableTransform, TransformStep};
pub use storage::{Artifact, ArtifactKind, ResultBundle, ResultStore};
