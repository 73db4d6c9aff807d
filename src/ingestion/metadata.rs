//! Batch metadata record
//!
//! Written once per ingestion to `<raw_root>/<batch_name>_metadata.json` and
//! overwritten wholesale when the same batch is ingested again.

use crate::error::Result;
use crate::ingestion::TableSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetadata {
    pub batch_name: String,

    /// When the batch was ingested (RFC 3339)
    pub timestamp: DateTime<Utc>,

    /// Source files that parsed successfully
    pub files: Vec<String>,

    /// Row count per included file
    pub row_counts: BTreeMap<String, usize>,
}

impl BatchMetadata {
    /// Describe exactly the tables given; nothing else is recorded
    pub fn from_tables(batch_name: &str, tables: &TableSet) -> Self {
        Self {
            batch_name: batch_name.to_string(),
            timestamp: Utc::now(),
            files: tables.keys().cloned().collect(),
            row_counts: tables
                .iter()
                .map(|(name, df)| (name.clone(), df.height()))
                .collect(),
        }
    }

    pub fn file_path(raw_root: &Path, batch_name: &str) -> PathBuf {
        raw_root.join(format!("{}_metadata.json", batch_name))
    }

    /// Write as pretty JSON via temp file + rename
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let content = serde_json::to_string_pretty(self)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".metadata")
            .suffix(".partial")
            .tempfile_in(parent)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)?;
        Ok(())
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
