//! Transformation steps
//!
//! A step is an opaque configuration value. What a step means is decided by
//! the `TableTransform` plugged into the processor; the processor itself only
//! guarantees ordering and the identity default.

use crate::error::{PipelineError, Result};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStep {
    /// Step name, used in logs and errors
    pub name: String,

    /// Free-form parameters interpreted by the transform
    #[serde(default)]
    pub params: Value,
}

impl TransformStep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Value::Null,
        }
    }

    pub fn with_params(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

/// Applies one step to one table
pub trait TableTransform: Send + Sync {
    fn apply(&self, table_name: &str, table: DataFrame, step: &TransformStep) -> anyhow::Result<DataFrame>;
}

/// Passes every table through unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTransform;

impl TableTransform for IdentityTransform {
    fn apply(&self, _table_name: &str, table: DataFrame, _step: &TransformStep) -> anyhow::Result<DataFrame> {
        Ok(table)
    }
}

/// Run `steps` in order over a copy of `table`
pub fn apply_steps(
    transform: &dyn TableTransform,
    table_name: &str,
    table: &DataFrame,
    steps: &[TransformStep],
) -> Result<DataFrame> {
    steps.iter().try_fold(table.clone(), |df, step| {
        transform
            .apply(table_name, df, step)
            .map_err(|e| PipelineError::Transform {
                table: table_name.to_string(),
                step: step.name.clone(),
                message: format!("{:#}", e),
            })
    })
}
