use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Batch directory {0} not found")]
    BatchNotFound(String),

    #[error("Processed batch {0} not found")]
    ProcessedBatchNotFound(String),

    #[error("Analysis '{analysis_id}' not found in {root}")]
    AnalysisNotFound { analysis_id: String, root: PathBuf },

    #[error("Version {version} not found in {analysis_id}")]
    VersionNotFound { analysis_id: String, version: String },

    // Analysis directory exists but holds no version subdirectories
    #[error("Analysis '{0}' exists but contains no versions. The results directory may be corrupted.")]
    CorruptAnalysis(String),

    #[error("No recognized result files found in {0}")]
    UnrecognizedResult(PathBuf),

    #[error("Error saving {table} to parquet: {message}")]
    StorageWrite { table: String, message: String },

    #[error("Transformation '{step}' failed on {table}: {message}")]
    Transform {
        table: String,
        step: String,
        message: String,
    },

    #[error("Data directory '{0}' not found. Create it first or check the path for typos.")]
    DataDirectoryMissing(PathBuf),

    #[error("Invalid {kind} name '{key}': {reason}")]
    InvalidKey {
        kind: &'static str,
        key: String,
        reason: String,
    },

    #[error("Version {version} already exists in {analysis_id}")]
    VersionExists { analysis_id: String, version: String },

    #[error("Error loading {file}: {message}")]
    Parse { file: String, message: String },

    #[error("Array format error: {0}")]
    ArrayFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl PipelineError {
    /// True for the "directory not found" family: missing batch, processed
    /// batch, analysis or version.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PipelineError::BatchNotFound(_)
                | PipelineError::ProcessedBatchNotFound(_)
                | PipelineError::AnalysisNotFound { .. }
                | PipelineError::VersionNotFound { .. }
        )
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::Polars(err.to_string())
    }
}

impl From<tempfile::PersistError> for PipelineError {
    fn from(err: tempfile::PersistError) -> Self {
        PipelineError::Io(err.error)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
