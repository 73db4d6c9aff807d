//! Batch Loader - reads a raw batch directory into DataFrames

use crate::config::CsvOptions;
use crate::error::{PipelineError, Result};
use crate::ingestion::{BatchMetadata, IngestReport, SkippedFile, TableSet};
use crate::keys::validate_batch_name;
use crate::locks::with_dir_lock;
use itertools::Itertools;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Handles loading and bookkeeping of raw CSV batches.
///
/// Each batch is a directory under the raw root; every file in it with the
/// configured extension becomes one table keyed by its file name.
pub struct BatchLoader {
    raw_data_path: PathBuf,
    csv: CsvOptions,
}

impl BatchLoader {
    /// Create a loader over `raw_data_path`, creating the root if needed
    pub fn new(raw_data_path: impl Into<PathBuf>) -> Result<Self> {
        let raw_data_path = raw_data_path.into();
        std::fs::create_dir_all(&raw_data_path)?;
        Ok(Self {
            raw_data_path,
            csv: CsvOptions::default(),
        })
    }

    pub fn with_csv_options(mut self, csv: CsvOptions) -> Self {
        self.csv = csv;
        self
    }

    pub fn raw_data_path(&self) -> &Path {
        &self.raw_data_path
    }

    /// Load a batch of CSV files, keyed by file name.
    ///
    /// Files that fail to parse are logged and left out; only a missing
    /// batch directory is an error.
    pub fn load_batch(&self, batch_name: &str) -> Result<TableSet> {
        Ok(self.load_batch_with_report(batch_name)?.tables)
    }

    /// Like `load_batch`, but also returns the files that were skipped
    pub fn load_batch_with_report(&self, batch_name: &str) -> Result<IngestReport> {
        validate_batch_name(batch_name)?;
        let batch_path = self.raw_data_path.join(batch_name);

        with_dir_lock(&batch_path, || -> Result<IngestReport> {
            if !batch_path.is_dir() {
                return Err(PipelineError::BatchNotFound(batch_name.to_string()));
            }

            let mut report = IngestReport::default();
            for path in self.source_files(&batch_path)? {
                let file_name = match path.file_name().and_then(|n| n.to_str()) {
                    Some(name) => name.to_string(),
                    None => continue,
                };

                match self.read_table(&path) {
                    Ok(df) => {
                        debug!(batch_name, file = %file_name, rows = df.height(), "csv_file_loaded");
                        report.tables.insert(file_name, df);
                    }
                    Err(e) => {
                        warn!(batch_name, file = %file_name, error = %e, "csv_file_skipped");
                        report.skipped.push(SkippedFile {
                            file_name,
                            reason: e.to_string(),
                        });
                    }
                }
            }

            info!(
                batch_name,
                loaded = report.tables.len(),
                skipped = report.skipped.len(),
                "batch_loaded"
            );
            Ok(report)
        })
    }

    /// Matching files directly inside the batch directory, sorted by name
    fn source_files(&self, batch_path: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(batch_path)? {
            let path = entry?.path();
            let matches_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == self.csv.extension)
                .unwrap_or(false);
            if matches_ext && path.is_file() {
                files.push(path);
            }
        }
        Ok(files.into_iter().sorted().collect())
    }

    fn read_table(&self, path: &Path) -> Result<DataFrame> {
        let file = path.display().to_string();
        let parse_err = |e: PolarsError| PipelineError::Parse {
            file: file.clone(),
            message: e.to_string(),
        };

        LazyCsvReader::new(path)
            .with_has_header(self.csv.has_header)
            .with_separator(self.csv.separator)
            .finish()
            .map_err(parse_err)?
            .collect()
            .map_err(parse_err)
    }

    /// Persist metadata describing exactly `tables`. Re-running for the same
    /// batch overwrites the previous record.
    pub fn save_batch_metadata(&self, batch_name: &str, tables: &TableSet) -> Result<BatchMetadata> {
        validate_batch_name(batch_name)?;
        let batch_path = self.raw_data_path.join(batch_name);

        with_dir_lock(&batch_path, || -> Result<BatchMetadata> {
            let metadata = BatchMetadata::from_tables(batch_name, tables);
            let path = BatchMetadata::file_path(&self.raw_data_path, batch_name);
            metadata.write_to(&path)?;
            info!(batch_name, files = metadata.files.len(), path = %path.display(), "batch_metadata_saved");
            Ok(metadata)
        })
    }

    pub fn load_batch_metadata(&self, batch_name: &str) -> Result<BatchMetadata> {
        validate_batch_name(batch_name)?;
        let path = BatchMetadata::file_path(&self.raw_data_path, batch_name);
        if !path.is_file() {
            return Err(PipelineError::BatchNotFound(batch_name.to_string()));
        }
        BatchMetadata::read_from(&path)
    }

    /// List all batch directories under the raw root (contents unchecked)
    pub fn list_available_batches(&self) -> Result<Vec<String>> {
        let mut batches = Vec::new();
        for entry in std::fs::read_dir(&self.raw_data_path)? {
            let entry = entry?;
            if entry.path().is_dir() {
                batches.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        batches.sort();
        Ok(batches)
    }
}
