//! Ingestion Module - raw batch directories into in-memory tables
//!
//! Reads every delimited-text file in `<raw_root>/<batch_name>/` into a
//! polars `DataFrame`. Per-file parse failures are skipped and reported;
//! only a missing batch directory is fatal. A `BatchMetadata` record can be
//! written alongside the batch describing exactly what was loaded.

pub mod loader;
pub mod metadata;

pub use loader::BatchLoader;
pub use metadata::BatchMetadata;

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tables of one batch keyed by source file name (directory stripped)
pub type TableSet = BTreeMap<String, DataFrame>;

/// A source file that could not be parsed and was left out of the batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub file_name: String,
    pub reason: String,
}

/// Outcome of loading one batch
#[derive(Clone, Debug, Default)]
pub struct IngestReport {
    /// Successfully parsed tables
    pub tables: TableSet,

    /// Files that failed to parse, in enumeration order
    pub skipped: Vec<SkippedFile>,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(|df| df.height()).sum()
    }
}
