mod common;

use common::{sandbox, write_file};
use polars::prelude::*;
use report_pipeline::storage::{ArrayCollection, ArrayData, NpyArray};
use report_pipeline::{Artifact, ArtifactKind, PipelineError, ResultBundle, ResultStore};
use serde_json::json;
use std::path::Path;

fn model_version(results_root: &Path, analysis_id: &str, version: &str, tag: &str) {
    write_file(
        &results_root.join(analysis_id).join(version),
        "model.json",
        &json!({ "version": tag }).to_string(),
    );
}

#[test]
fn test_store_requires_existing_root() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = ResultStore::new(dir.path().join("results")).err().unwrap();
    assert!(matches!(err, PipelineError::DataDirectoryMissing(_)));
}

#[test]
fn test_latest_version_is_lexicographic() {
    let (_dir, config) = sandbox();
    for version in ["v1", "v2", "v10"] {
        model_version(&config.results_root, "churn", version, version);
    }
    let store = ResultStore::new(&config.results_root).unwrap();

    // "v2" > "v10" as strings; no numeric interpretation is applied
    assert_eq!(store.latest_version("churn").unwrap(), "v2");
    assert_eq!(store.list_versions("churn").unwrap(), vec!["v1", "v10", "v2"]);

    let bundle = store.load_analysis("churn", None).unwrap();
    assert_eq!(bundle.document(), Some(&json!({ "version": "v2" })));
}

#[test]
fn test_explicit_version() {
    let (_dir, config) = sandbox();
    for version in ["2025-01-01", "2025-02-01"] {
        model_version(&config.results_root, "churn", version, version);
    }
    let store = ResultStore::new(&config.results_root).unwrap();

    let bundle = store.load_analysis("churn", Some("2025-01-01")).unwrap();
    assert_eq!(bundle.document(), Some(&json!({ "version": "2025-01-01" })));

    let err = store.load_analysis("churn", Some("2024-12-01")).unwrap_err();
    assert!(matches!(err, PipelineError::VersionNotFound { ref version, .. } if version == "2024-12-01"));
}

#[test]
fn test_missing_and_empty_analysis_are_distinct() {
    let (_dir, config) = sandbox();
    std::fs::create_dir_all(config.results_root.join("empty_analysis")).unwrap();
    let store = ResultStore::new(&config.results_root).unwrap();

    let missing = store.load_analysis("missing_id", None).unwrap_err();
    assert!(matches!(missing, PipelineError::AnalysisNotFound { .. }));
    assert!(missing.is_not_found());

    let empty = store.load_analysis("empty_analysis", None).unwrap_err();
    assert!(matches!(empty, PipelineError::CorruptAnalysis(ref id) if id == "empty_analysis"));
    assert!(!empty.is_not_found());
}

#[test]
fn test_files_beside_versions_do_not_count() {
    let (_dir, config) = sandbox();
    write_file(&config.results_root.join("loose"), "model.json", "{}");
    let store = ResultStore::new(&config.results_root).unwrap();

    assert!(matches!(
        store.load_analysis("loose", None),
        Err(PipelineError::CorruptAnalysis(_))
    ));
}

#[test]
fn test_unrecognized_version_contents() {
    let (_dir, config) = sandbox();
    write_file(&config.results_root.join("odd").join("v1"), "weights.bin", "\x00\x01");
    let store = ResultStore::new(&config.results_root).unwrap();

    let err = store.load_analysis("odd", None).unwrap_err();
    assert!(matches!(err, PipelineError::UnrecognizedResult(_)));
}

#[test]
fn test_model_only_bundle() {
    let (_dir, config) = sandbox();
    model_version(&config.results_root, "churn", "v1", "v1");
    let store = ResultStore::new(&config.results_root).unwrap();

    let bundle = store.load_analysis("churn", None).unwrap();
    assert_eq!(bundle.tags(), vec!["model"]);
    assert!(bundle.table().is_none());
    assert!(bundle.arrays().is_none());
}

#[test]
fn test_save_and_load_full_bundle() {
    let (_dir, config) = sandbox();
    let store = ResultStore::new(&config.results_root).unwrap();

    let table = df!["customer" => ["c1", "c2"], "score" => [0.9, 0.15]].unwrap();
    let mut arrays = ArrayCollection::new();
    arrays.insert("coefficients", NpyArray::vector(ArrayData::Float64(vec![0.25, -1.5, 3.0])));
    arrays.insert(
        "confusion",
        NpyArray::new(vec![2, 2], ArrayData::Int64(vec![50, 3, 4, 43])).unwrap(),
    );
    let bundle = ResultBundle::new()
        .with(Artifact::Table(table.clone()))
        .with(Artifact::Document(json!({ "kind": "logistic", "features": 3 })))
        .with(Artifact::Arrays(arrays.clone()));

    let path = store.save_version("churn", "2025-05-01", &bundle).unwrap();
    for kind in ArtifactKind::ALL {
        assert!(path.join(kind.file_name()).is_file());
    }

    let loaded = store.load_analysis("churn", None).unwrap();
    assert_eq!(loaded.kinds(), ArtifactKind::ALL.to_vec());
    assert!(loaded.table().unwrap().equals(&table));
    assert_eq!(loaded.document().unwrap()["kind"], "logistic");
    assert_eq!(loaded.arrays().unwrap(), &arrays);
    assert_eq!(
        loaded.arrays().unwrap().get("confusion").unwrap().shape,
        vec![2, 2]
    );
}

#[test]
fn test_versions_are_immutable() {
    let (_dir, config) = sandbox();
    let store = ResultStore::new(&config.results_root).unwrap();
    let bundle = ResultBundle::new().with(Artifact::Document(json!({ "run": 1 })));

    store.save_version("churn", "v1", &bundle).unwrap();
    let again = ResultBundle::new().with(Artifact::Document(json!({ "run": 2 })));
    let err = store.save_version("churn", "v1", &again).unwrap_err();
    assert!(matches!(err, PipelineError::VersionExists { .. }));

    let loaded = store.load_analysis("churn", Some("v1")).unwrap();
    assert_eq!(loaded.document(), Some(&json!({ "run": 1 })));
}

#[test]
fn test_staging_is_invisible() {
    let (_dir, config) = sandbox();
    let store = ResultStore::new(&config.results_root).unwrap();
    store
        .save_version("churn", "v1", &ResultBundle::new().with(Artifact::Document(json!({}))))
        .unwrap();
    std::fs::create_dir_all(config.results_root.join(".staging-leftover")).unwrap();

    assert_eq!(store.list_analyses().unwrap(), vec!["churn"]);
    assert!(matches!(
        store.save_version("churn", "v2", &ResultBundle::new()),
        Err(PipelineError::UnrecognizedResult(_))
    ));
    assert_eq!(store.list_versions("churn").unwrap(), vec!["v1"]);
}

#[test]
fn test_identifiers_cannot_traverse() {
    let (_dir, config) = sandbox();
    model_version(&config.results_root, "churn", "v1", "v1");
    let store = ResultStore::new(&config.results_root).unwrap();

    assert!(matches!(
        store.load_analysis("..", None),
        Err(PipelineError::InvalidKey { kind: "analysis", .. })
    ));
    assert!(matches!(
        store.load_analysis("churn", Some("../churn/v1")),
        Err(PipelineError::InvalidKey { kind: "version", .. })
    ));
}
