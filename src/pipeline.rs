//! Batch pipeline: raw CSV batch → metadata → processed parquet batch
//!
//! Expected failures at each stage are logged and returned as an outcome
//! rather than propagated, so a caller driving many batches keeps going.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::ingestion::BatchLoader;
use crate::processing::{BatchProcessor, TableTransform, TransformStep};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Debug)]
pub enum PipelineOutcome {
    /// Every loaded table was processed and persisted
    Completed {
        tables: usize,
        skipped: usize,
        output_dir: PathBuf,
    },
    /// The batch exists but no file in it could be parsed
    NoTables { skipped: usize },
    LoadFailed(PipelineError),
    MetadataFailed(PipelineError),
    ProcessFailed(PipelineError),
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Completed { .. })
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            PipelineOutcome::LoadFailed(e)
            | PipelineOutcome::MetadataFailed(e)
            | PipelineOutcome::ProcessFailed(e) => Some(e),
            _ => None,
        }
    }
}

pub struct BatchPipeline {
    loader: BatchLoader,
    processor: BatchProcessor,
    transformations: Vec<TransformStep>,
}

impl BatchPipeline {
    /// Build loader and processor from `config`. The processed root must
    /// already exist.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let loader = BatchLoader::new(&config.raw_root)?.with_csv_options(config.csv.clone());
        let processor = BatchProcessor::new(&config.processed_root)?;
        Ok(Self::from_parts(loader, processor))
    }

    pub fn from_parts(loader: BatchLoader, processor: BatchProcessor) -> Self {
        Self {
            loader,
            processor,
            transformations: Vec::new(),
        }
    }

    pub fn with_transformations(mut self, steps: Vec<TransformStep>) -> Self {
        self.transformations = steps;
        self
    }

    pub fn with_transform(mut self, transform: Box<dyn TableTransform>) -> Self {
        self.processor = self.processor.with_transform(transform);
        self
    }

    pub fn loader(&self) -> &BatchLoader {
        &self.loader
    }

    pub fn processor(&self) -> &BatchProcessor {
        &self.processor
    }

    /// Process one batch of CSV files into parquet
    pub fn run(&self, batch_name: &str) -> PipelineOutcome {
        info!(batch_name, "loading_csv_files");
        let report = match self.loader.load_batch_with_report(batch_name) {
            Ok(report) => report,
            Err(e) => {
                error!(batch_name, error = %e, "batch_load_failed");
                return PipelineOutcome::LoadFailed(e);
            }
        };
        let skipped = report.skipped.len();

        if report.is_empty() {
            warn!(batch_name, skipped, "no_csv_files_found");
            return PipelineOutcome::NoTables { skipped };
        }
        info!(batch_name, file_count = report.tables.len(), skipped, "loaded_csv_files");

        if let Err(e) = self.loader.save_batch_metadata(batch_name, &report.tables) {
            error!(batch_name, error = %e, "batch_metadata_failed");
            return PipelineOutcome::MetadataFailed(e);
        }

        info!(batch_name, "processing_files");
        match self
            .processor
            .process_batch(&report.tables, batch_name, &self.transformations)
        {
            Ok(processed) => {
                let output_dir = self.processor.batch_dir(batch_name);
                info!(batch_name, output_dir = %output_dir.display(), "batch_processing_complete");
                PipelineOutcome::Completed {
                    tables: processed.len(),
                    skipped,
                    output_dir,
                }
            }
            Err(e) => {
                error!(batch_name, error = %e, "batch_processing_failed");
                PipelineOutcome::ProcessFailed(e)
            }
        }
    }
}
