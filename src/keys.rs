//! Namespace keys
//!
//! Batches, tables, analyses and versions are all addressed by directory or
//! file names. Every such name is checked here before it is joined onto a
//! root path, so no caller-supplied key can escape its tree.

use crate::error::{PipelineError, Result};

pub const MAX_KEY_LEN: usize = 255;

const FORBIDDEN_CHARS: [char; 3] = ['/', '\\', '\0'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Batch,
    Table,
    Analysis,
    Version,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Batch => "batch",
            KeyKind::Table => "table",
            KeyKind::Analysis => "analysis",
            KeyKind::Version => "version",
        }
    }
}

pub fn validate_key(kind: KeyKind, key: &str) -> Result<()> {
    let reject = |reason: &str| PipelineError::InvalidKey {
        kind: kind.as_str(),
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(reject("name is empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(reject("name is longer than 255 bytes"));
    }
    if is_hidden(key) {
        return Err(reject("name must not start with '.'"));
    }
    if key.contains(FORBIDDEN_CHARS) {
        return Err(reject("name must not contain '/', '\\' or NUL"));
    }
    Ok(())
}

pub fn validate_batch_name(name: &str) -> Result<()> {
    validate_key(KeyKind::Batch, name)
}

pub fn validate_table_name(name: &str) -> Result<()> {
    validate_key(KeyKind::Table, name)
}

pub fn validate_analysis_id(id: &str) -> Result<()> {
    validate_key(KeyKind::Analysis, id)
}

pub fn validate_version(version: &str) -> Result<()> {
    validate_key(KeyKind::Version, version)
}

/// Names starting with '.' are staging areas and never valid keys
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}
