//! Batch Processor - transforms tables and persists them as parquet
//!
//! Output layout: `<processed_root>/<batch_name>/<table>.parquet`, snappy
//! compressed. A batch is written into a hidden staging directory first and
//! swapped into place only once every table has been written, so a failed
//! run never leaves a half-written batch behind.

use crate::error::{PipelineError, Result};
use crate::ingestion::TableSet;
use crate::keys::{is_hidden, validate_batch_name, validate_table_name};
use crate::locks::with_dir_lock;
use crate::processing::transform::{apply_steps, IdentityTransform, TableTransform, TransformStep};
use itertools::Itertools;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const PARQUET_EXTENSION: &str = "parquet";

/// Processes batches of tables and manages the processed-data tree.
///
/// The root must exist before construction; use
/// [`BatchProcessor::create_data_directory`] to create it deliberately.
pub struct BatchProcessor {
    processed_data_path: PathBuf,
    transform: Box<dyn TableTransform>,
}

impl BatchProcessor {
    pub fn new(processed_data_path: impl Into<PathBuf>) -> Result<Self> {
        let processed_data_path = processed_data_path.into();
        if !processed_data_path.is_dir() {
            return Err(PipelineError::DataDirectoryMissing(processed_data_path));
        }
        Ok(Self {
            processed_data_path,
            transform: Box::new(IdentityTransform),
        })
    }

    /// Create the processed-data root (and parents) if it doesn't exist
    pub fn create_data_directory(processed_data_path: impl AsRef<Path>) -> Result<()> {
        std::fs::create_dir_all(processed_data_path)?;
        Ok(())
    }

    /// Plug in the transform that interprets `TransformStep`s
    pub fn with_transform(mut self, transform: Box<dyn TableTransform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn processed_data_path(&self) -> &Path {
        &self.processed_data_path
    }

    pub fn batch_dir(&self, batch_name: &str) -> PathBuf {
        self.processed_data_path.join(batch_name)
    }

    /// Apply `transformations` in order to every table, then persist the
    /// whole batch. Any failure aborts the call and nothing is published.
    pub fn process_batch(
        &self,
        tables: &TableSet,
        batch_name: &str,
        transformations: &[TransformStep],
    ) -> Result<TableSet> {
        validate_batch_name(batch_name)?;

        let mut processed = TableSet::new();
        for (name, df) in tables {
            validate_table_name(name)?;
            let out = apply_steps(self.transform.as_ref(), name, df, transformations)?;
            debug!(batch_name, table = %name, steps = transformations.len(), rows = out.height(), "table_transformed");
            processed.insert(name.clone(), out);
        }

        self.save_processed_batch(&processed, batch_name)?;
        Ok(processed)
    }

    /// Write every table to `<batch_dir>/<name>.parquet`, replacing any
    /// previous contents of the batch directory.
    pub fn save_processed_batch(&self, tables: &TableSet, batch_name: &str) -> Result<PathBuf> {
        validate_batch_name(batch_name)?;
        for name in tables.keys() {
            validate_table_name(name)?;
        }
        let batch_dir = self.batch_dir(batch_name);

        with_dir_lock(&batch_dir, || -> Result<PathBuf> {
            // Dropping the TempDir removes the staging area on any early return
            let staging = tempfile::Builder::new()
                .prefix(&format!(".{}.staging-", batch_name))
                .tempdir_in(&self.processed_data_path)?;

            for (name, df) in tables {
                let path = staging.path().join(format!("{}.{}", name, PARQUET_EXTENSION));
                write_parquet(&path, df).map_err(|e| {
                    warn!(batch_name, table = %name, error = %e, "parquet_write_failed");
                    PipelineError::StorageWrite {
                        table: name.clone(),
                        message: e.to_string(),
                    }
                })?;
            }

            self.publish(staging.path(), &batch_dir)?;
            info!(batch_name, tables = tables.len(), output_dir = %batch_dir.display(), "processed_batch_saved");
            Ok(batch_dir.clone())
        })
    }

    /// Swap a fully written staging directory into `batch_dir`
    fn publish(&self, staging: &Path, batch_dir: &Path) -> Result<()> {
        if !batch_dir.exists() {
            std::fs::rename(staging, batch_dir)?;
            return Ok(());
        }

        let name = batch_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let retired = self
            .processed_data_path
            .join(format!(".{}.old-{}", name, Uuid::new_v4()));

        std::fs::rename(batch_dir, &retired)?;
        if let Err(e) = std::fs::rename(staging, batch_dir) {
            // Put the previous batch back before reporting
            if let Err(restore) = std::fs::rename(&retired, batch_dir) {
                warn!(batch_dir = %batch_dir.display(), error = %restore, "batch_restore_failed");
            }
            return Err(e.into());
        }

        if let Err(e) = std::fs::remove_dir_all(&retired) {
            warn!(path = %retired.display(), error = %e, "retired_batch_cleanup_failed");
        }
        Ok(())
    }

    /// Load a previously processed batch, keyed by table name (extension
    /// stripped). Purely filesystem driven; batch metadata is not consulted.
    pub fn load_processed_batch(&self, batch_name: &str) -> Result<TableSet> {
        validate_batch_name(batch_name)?;
        let batch_dir = self.batch_dir(batch_name);

        with_dir_lock(&batch_dir, || -> Result<TableSet> {
            if !batch_dir.is_dir() {
                return Err(PipelineError::ProcessedBatchNotFound(batch_name.to_string()));
            }

            let mut processed = TableSet::new();
            for path in parquet_files(&batch_dir)? {
                let name = match path.file_stem().and_then(|s| s.to_str()) {
                    Some(stem) => stem.to_string(),
                    None => continue,
                };
                processed.insert(name, read_parquet(&path)?);
            }

            info!(batch_name, tables = processed.len(), "processed_batch_loaded");
            Ok(processed)
        })
    }

    /// Processed batch directories, sorted; staging areas are excluded
    pub fn list_processed_batches(&self) -> Result<Vec<String>> {
        let mut batches = Vec::new();
        for entry in std::fs::read_dir(&self.processed_data_path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_dir() && !is_hidden(&name) {
                batches.push(name);
            }
        }
        batches.sort();
        Ok(batches)
    }
}

fn parquet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(PARQUET_EXTENSION) {
            files.push(path);
        }
    }
    Ok(files.into_iter().sorted().collect())
}

/// Snappy-compressed parquet, fsynced before returning
pub fn write_parquet(path: &Path, df: &DataFrame) -> Result<()> {
    let mut file = File::create(path)?;
    let mut df = df.clone();
    ParquetWriter::new(&mut file)
        .with_compression(ParquetCompression::Snappy)
        .finish(&mut df)?;
    file.sync_all()?;
    Ok(())
}

pub fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)?;
    Ok(ParquetReader::new(file).finish()?)
}
