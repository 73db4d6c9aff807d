//! Processing Module - transformation and columnar persistence of batches

pub mod processor;
pub mod transform;

pub use processor::{read_parquet, write_parquet, BatchProcessor, PARQUET_EXTENSION};
pub use transform::{apply_steps, IdentityTransform, TableTransform, TransformStep};
