#![allow(dead_code)]

use report_pipeline::{BatchProcessor, PipelineConfig, ResultStore};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Temp directory with raw/processed/results roots created
pub fn sandbox() -> (TempDir, PipelineConfig) {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::with_base_dir(dir.path());
    fs::create_dir_all(&config.raw_root).unwrap();
    BatchProcessor::create_data_directory(&config.processed_root).unwrap();
    ResultStore::create_results_directory(&config.results_root).unwrap();
    (dir, config)
}

pub fn write_file(dir: &Path, name: &str, content: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
}

pub const SALES_CSV: &str = "region,units,revenue\nnorth,10,120.5\nsouth,4,48.0\neast,7,91.25\n";
pub const RETURNS_CSV: &str = "sku,count\nA-1,2\nB-7,1\n";
