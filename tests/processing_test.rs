mod common;

use common::{sandbox, write_file, RETURNS_CSV, SALES_CSV};
use polars::prelude::*;
use report_pipeline::processing::read_parquet;
use report_pipeline::{
    BatchLoader, BatchProcessor, PipelineError, TableSet, TableTransform, TransformStep,
};

fn sample_tables() -> TableSet {
    let mut tables = TableSet::new();
    tables.insert(
        "sales.csv".to_string(),
        df![
            "region" => ["north", "south", "east"],
            "units" => [10i64, 4, 7],
            "revenue" => [Some(120.5), None, Some(91.25)]
        ]
        .unwrap(),
    );
    tables.insert(
        "returns.csv".to_string(),
        df!["sku" => ["A-1", "B-7"], "count" => [2i64, 1]].unwrap(),
    );
    tables
}

/// Drops the last row of a table for every step
struct DropLastRow;

impl TableTransform for DropLastRow {
    fn apply(&self, _table_name: &str, table: DataFrame, _step: &TransformStep) -> anyhow::Result<DataFrame> {
        let keep = table.height().saturating_sub(1);
        Ok(table.head(Some(keep)))
    }
}

#[test]
fn test_processor_requires_existing_root() {
    let dir = tempfile::TempDir::new().unwrap();
    let root = dir.path().join("processed");

    let err = BatchProcessor::new(&root).err().unwrap();
    assert!(matches!(err, PipelineError::DataDirectoryMissing(_)));
    assert!(!root.exists());

    BatchProcessor::create_data_directory(&root).unwrap();
    assert!(BatchProcessor::new(&root).is_ok());
}

#[test]
fn test_empty_transformations_are_identity() {
    let (_dir, config) = sandbox();
    let processor = BatchProcessor::new(&config.processed_root).unwrap();
    let tables = sample_tables();

    let processed = processor.process_batch(&tables, "may_2025", &[]).unwrap();

    assert_eq!(processed.len(), tables.len());
    for (name, df) in &tables {
        assert!(processed[name].equals_missing(df), "{name} changed");
    }
}

#[test]
fn test_round_trip_through_parquet() {
    let (_dir, config) = sandbox();
    let processor = BatchProcessor::new(&config.processed_root).unwrap();
    let tables = sample_tables();

    processor.process_batch(&tables, "may_2025", &[]).unwrap();
    let batch_dir = config.processed_root.join("may_2025");
    assert!(batch_dir.join("sales.csv.parquet").is_file());
    assert!(batch_dir.join("returns.csv.parquet").is_file());

    let reloaded = processor.load_processed_batch("may_2025").unwrap();
    assert_eq!(reloaded.keys().collect::<Vec<_>>(), tables.keys().collect::<Vec<_>>());
    for (name, df) in &tables {
        assert!(reloaded[name].equals_missing(df), "{name} differs after reload");
    }
}

#[test]
fn test_csv_batch_round_trip() {
    let (_dir, config) = sandbox();
    let batch = config.raw_root.join("may_2025");
    write_file(&batch, "sales.csv", SALES_CSV);
    write_file(&batch, "returns.csv", RETURNS_CSV);

    let loader = BatchLoader::new(&config.raw_root).unwrap();
    let processor = BatchProcessor::new(&config.processed_root).unwrap();
    let tables = loader.load_batch("may_2025").unwrap();

    processor.process_batch(&tables, "may_2025", &[]).unwrap();
    let reloaded = processor.load_processed_batch("may_2025").unwrap();

    for (name, df) in &tables {
        assert!(reloaded[name].equals_missing(df));
    }
}

#[test]
fn test_transform_steps_are_applied_and_persisted() {
    let (_dir, config) = sandbox();
    let processor = BatchProcessor::new(&config.processed_root)
        .unwrap()
        .with_transform(Box::new(DropLastRow));
    let steps = vec![TransformStep::new("trim"), TransformStep::new("trim_again")];

    let processed = processor.process_batch(&sample_tables(), "trimmed", &steps).unwrap();
    assert_eq!(processed["sales.csv"].height(), 1);
    assert_eq!(processed["returns.csv"].height(), 0);

    let on_disk = read_parquet(&config.processed_root.join("trimmed/sales.csv.parquet")).unwrap();
    assert_eq!(on_disk.height(), 1);
}

#[test]
fn test_write_failure_aborts_whole_batch() {
    let (_dir, config) = sandbox();
    let processor = BatchProcessor::new(&config.processed_root).unwrap();

    // Valid key, but `<name>.parquet` exceeds the filesystem's name limit
    let long_name = "t".repeat(250);
    let mut tables = sample_tables();
    tables.insert(long_name.clone(), df!["x" => [1i64]].unwrap());

    match processor.process_batch(&tables, "doomed", &[]) {
        Err(PipelineError::StorageWrite { table, .. }) => assert_eq!(table, long_name),
        other => panic!("expected storage error, got {:?}", other.map(|t| t.len())),
    }

    assert!(!config.processed_root.join("doomed").exists());
    assert!(processor.list_processed_batches().unwrap().is_empty());
    let leftovers = std::fs::read_dir(&config.processed_root).unwrap().count();
    assert_eq!(leftovers, 0, "staging directory was not cleaned up");
}

#[test]
fn test_failed_rerun_keeps_previous_batch() {
    let (_dir, config) = sandbox();
    let processor = BatchProcessor::new(&config.processed_root).unwrap();
    processor.process_batch(&sample_tables(), "may_2025", &[]).unwrap();

    let mut broken = sample_tables();
    broken.insert("t".repeat(250), df!["x" => [1i64]].unwrap());
    assert!(processor.process_batch(&broken, "may_2025", &[]).is_err());

    let reloaded = processor.load_processed_batch("may_2025").unwrap();
    assert_eq!(reloaded.len(), 2);
}

#[test]
fn test_reprocessing_replaces_batch_contents() {
    let (_dir, config) = sandbox();
    let processor = BatchProcessor::new(&config.processed_root).unwrap();
    processor.process_batch(&sample_tables(), "may_2025", &[]).unwrap();

    let mut only_sales = sample_tables();
    only_sales.remove("returns.csv");
    processor.process_batch(&only_sales, "may_2025", &[]).unwrap();

    let reloaded = processor.load_processed_batch("may_2025").unwrap();
    assert_eq!(reloaded.keys().collect::<Vec<_>>(), vec!["sales.csv"]);
    assert_eq!(processor.list_processed_batches().unwrap(), vec!["may_2025"]);
}

#[test]
fn test_load_missing_processed_batch() {
    let (_dir, config) = sandbox();
    let processor = BatchProcessor::new(&config.processed_root).unwrap();

    let err = processor.load_processed_batch("never_run").unwrap_err();
    assert!(matches!(err, PipelineError::ProcessedBatchNotFound(_)));
}

#[test]
fn test_load_ignores_non_parquet_files() {
    let (_dir, config) = sandbox();
    let processor = BatchProcessor::new(&config.processed_root).unwrap();
    processor.process_batch(&sample_tables(), "may_2025", &[]).unwrap();
    write_file(&config.processed_root.join("may_2025"), "README.md", "notes");

    let reloaded = processor.load_processed_batch("may_2025").unwrap();
    assert_eq!(reloaded.len(), 2);
}

#[test]
fn test_table_names_are_validated() {
    let (_dir, config) = sandbox();
    let processor = BatchProcessor::new(&config.processed_root).unwrap();
    let mut tables = TableSet::new();
    tables.insert("../escape".to_string(), df!["x" => [1i64]].unwrap());

    let err = processor.process_batch(&tables, "may_2025", &[]).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidKey { kind: "table", .. }));
}
