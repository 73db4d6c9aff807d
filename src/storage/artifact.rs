//! Result artifacts
//!
//! A version directory may hold any subset of three artifact kinds, each
//! under a fixed file name. Loading a version is a fold over this closed
//! set: every kind whose file is present is read with its own loader.

use crate::error::Result;
use crate::processing::{read_parquet, write_parquet};
use crate::storage::npz::ArrayCollection;
use polars::prelude::DataFrame;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    /// Columnar table, `data.parquet`
    Data,
    /// Structured model document, `model.json`
    Model,
    /// Numeric array collection, `arrays.npz`
    Arrays,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [ArtifactKind::Data, ArtifactKind::Model, ArtifactKind::Arrays];

    pub fn tag(&self) -> &'static str {
        match self {
            ArtifactKind::Data => "data",
            ArtifactKind::Model => "model",
            ArtifactKind::Arrays => "arrays",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Data => "data.parquet",
            ArtifactKind::Model => "model.json",
            ArtifactKind::Arrays => "arrays.npz",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn load(&self, path: &Path) -> Result<Artifact> {
        Ok(match self {
            ArtifactKind::Data => Artifact::Table(read_parquet(path)?),
            ArtifactKind::Model => {
                let content = std::fs::read_to_string(path)?;
                Artifact::Document(serde_json::from_str(&content)?)
            }
            ArtifactKind::Arrays => Artifact::Arrays(ArrayCollection::read_npz(path)?),
        })
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone)]
pub enum Artifact {
    Table(DataFrame),
    Document(Value),
    Arrays(ArrayCollection),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Table(_) => ArtifactKind::Data,
            Artifact::Document(_) => ArtifactKind::Model,
            Artifact::Arrays(_) => ArtifactKind::Arrays,
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        match self {
            Artifact::Table(df) => write_parquet(path, df),
            Artifact::Document(doc) => {
                std::fs::write(path, serde_json::to_string_pretty(doc)?)?;
                Ok(())
            }
            Artifact::Arrays(arrays) => arrays.write_npz(path),
        }
    }
}

/// Artifacts of one version, at most one per kind
#[derive(Debug, Clone, Default)]
pub struct ResultBundle {
    artifacts: BTreeMap<ArtifactKind, Artifact>,
}

impl ResultBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every recognized artifact present in `dir`; absent kinds are skipped
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        ArtifactKind::ALL.iter().try_fold(Self::new(), |mut bundle, kind| -> Result<Self> {
            let path = dir.join(kind.file_name());
            if path.is_file() {
                bundle.insert(kind.load(&path)?);
            }
            Ok(bundle)
        })
    }

    /// Insert `artifact`, returning the one of the same kind it replaced
    pub fn insert(&mut self, artifact: Artifact) -> Option<Artifact> {
        self.artifacts.insert(artifact.kind(), artifact)
    }

    pub fn with(mut self, artifact: Artifact) -> Self {
        self.insert(artifact);
        self
    }

    pub fn get(&self, kind: ArtifactKind) -> Option<&Artifact> {
        self.artifacts.get(&kind)
    }

    pub fn contains(&self, kind: ArtifactKind) -> bool {
        self.artifacts.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<ArtifactKind> {
        self.artifacts.keys().copied().collect()
    }

    pub fn tags(&self) -> Vec<&'static str> {
        self.artifacts.keys().map(|k| k.tag()).collect()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArtifactKind, &Artifact)> {
        self.artifacts.iter()
    }

    pub fn table(&self) -> Option<&DataFrame> {
        match self.get(ArtifactKind::Data) {
            Some(Artifact::Table(df)) => Some(df),
            _ => None,
        }
    }

    pub fn document(&self) -> Option<&Value> {
        match self.get(ArtifactKind::Model) {
            Some(Artifact::Document(doc)) => Some(doc),
            _ => None,
        }
    }

    pub fn arrays(&self) -> Option<&ArrayCollection> {
        match self.get(ArtifactKind::Arrays) {
            Some(Artifact::Arrays(arrays)) => Some(arrays),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_tags_and_files() {
        let files: Vec<_> = ArtifactKind::ALL.iter().map(|k| k.file_name()).collect();
        assert_eq!(files, vec!["data.parquet", "model.json", "arrays.npz"]);
        assert_eq!(ArtifactKind::from_tag("model"), Some(ArtifactKind::Model));
        assert_eq!(ArtifactKind::from_tag("weights"), None);
        assert_eq!(ArtifactKind::Arrays.to_string(), "arrays");
    }

    #[test]
    fn test_bundle_keeps_one_per_kind() {
        let mut bundle = ResultBundle::new().with(Artifact::Document(json!({"a": 1})));
        let replaced = bundle.insert(Artifact::Document(json!({"a": 2})));

        assert!(matches!(replaced, Some(Artifact::Document(_))));
        assert_eq!(bundle.len(), 1);
        assert_eq!(bundle.document(), Some(&json!({"a": 2})));
        assert!(bundle.table().is_none());
    }

    #[test]
    fn test_load_from_dir_ignores_unknown_files() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("model.json"), r#"{"coef": [0.5]}"#).unwrap();

        let bundle = ResultBundle::load_from_dir(dir.path()).unwrap();
        assert_eq!(bundle.tags(), vec!["model"]);
    }
}
