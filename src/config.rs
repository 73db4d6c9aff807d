//! Pipeline configuration
//!
//! Roots for the three directory trees plus the CSV dialect used for
//! ingestion. Components take these paths explicitly at construction;
//! `from_env` exists for the command-line wrapper only.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const RAW_ROOT_ENV: &str = "REPORT_PIPELINE_RAW_ROOT";
pub const PROCESSED_ROOT_ENV: &str = "REPORT_PIPELINE_PROCESSED_ROOT";
pub const RESULTS_ROOT_ENV: &str = "REPORT_PIPELINE_RESULTS_ROOT";

/// Delimited-text dialect for batch ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// File extension (without dot) that marks a file as part of a batch
    pub extension: String,

    /// Field separator byte
    pub separator: u8,

    /// Whether the first line is a header row
    pub has_header: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            extension: "csv".to_string(),
            separator: b',',
            has_header: true,
        }
    }
}

impl CsvOptions {
    /// Tab-separated `.tsv` batches
    pub fn tsv() -> Self {
        Self {
            extension: "tsv".to_string(),
            separator: b'\t',
            has_header: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub raw_root: PathBuf,
    pub processed_root: PathBuf,
    pub results_root: PathBuf,
    pub csv: CsvOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_root: PathBuf::from("data/raw"),
            processed_root: PathBuf::from("data/processed"),
            results_root: PathBuf::from("data/results"),
            csv: CsvOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// All three roots under a single base directory
    pub fn with_base_dir(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            raw_root: base.join("raw"),
            processed_root: base.join("processed"),
            results_root: base.join("results"),
            csv: CsvOptions::default(),
        }
    }

    /// Load configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Defaults overlaid with `.env` / process environment root overrides
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(RAW_ROOT_ENV) {
            self.raw_root = PathBuf::from(raw);
        }
        if let Some(processed) = lookup(PROCESSED_ROOT_ENV) {
            self.processed_root = PathBuf::from(processed);
        }
        if let Some(results) = lookup(RESULTS_ROOT_ENV) {
            self.results_root = PathBuf::from(results);
        }
        self
    }
}
