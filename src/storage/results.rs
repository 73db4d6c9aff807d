//! Result Store - versioned analysis artifacts
//!
//! Layout: `<results_root>/<analysis_id>/<version>/{data.parquet,model.json,arrays.npz}`.
//! "Latest" is the lexicographically greatest version directory name; no
//! numeric or date interpretation is applied, so `v10` sorts before `v2`.

use crate::error::{PipelineError, Result};
use crate::keys::{is_hidden, validate_analysis_id, validate_version};
use crate::locks::with_dir_lock;
use crate::storage::artifact::ResultBundle;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Manages retrieval and publication of analysis results.
pub struct ResultStore {
    results_path: PathBuf,
}

impl ResultStore {
    /// Open an existing results directory
    pub fn new(results_path: impl Into<PathBuf>) -> Result<Self> {
        let results_path = results_path.into();
        if !results_path.is_dir() {
            return Err(PipelineError::DataDirectoryMissing(results_path));
        }
        Ok(Self { results_path })
    }

    pub fn create_results_directory(results_path: impl AsRef<Path>) -> Result<()> {
        std::fs::create_dir_all(results_path)?;
        Ok(())
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    /// Analysis directories, sorted; staging areas are excluded
    pub fn list_analyses(&self) -> Result<Vec<String>> {
        let mut analyses = Vec::new();
        for entry in std::fs::read_dir(&self.results_path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.path().is_dir() && !is_hidden(&name) {
                analyses.push(name);
            }
        }
        analyses.sort();
        Ok(analyses)
    }

    /// Version directory names of an analysis in ascending lexicographic order
    pub fn list_versions(&self, analysis_id: &str) -> Result<Vec<String>> {
        let analysis_path = self.analysis_path(analysis_id)?;
        version_names(&analysis_path)
    }

    /// Resolve `version`, or the latest version when `None`
    pub fn resolve_version(&self, analysis_id: &str, version: Option<&str>) -> Result<String> {
        let analysis_path = self.validate_analysis_path(analysis_id)?;
        let (name, _) = self.get_version_path(analysis_id, &analysis_path, version)?;
        Ok(name)
    }

    pub fn latest_version(&self, analysis_id: &str) -> Result<String> {
        self.resolve_version(analysis_id, None)
    }

    /// Load analysis results, detecting which artifact kinds are present.
    ///
    /// Fails when the analysis is missing, has no versions, the requested
    /// version is missing, or the version holds none of the known files.
    pub fn load_analysis(&self, analysis_id: &str, version: Option<&str>) -> Result<ResultBundle> {
        let analysis_path = self.validate_analysis_path(analysis_id)?;
        let (version_name, version_path) = self.get_version_path(analysis_id, &analysis_path, version)?;

        let bundle = ResultBundle::load_from_dir(&version_path)?;
        if bundle.is_empty() {
            return Err(PipelineError::UnrecognizedResult(version_path));
        }

        info!(analysis_id, version = %version_name, artifacts = ?bundle.tags(), "analysis_loaded");
        Ok(bundle)
    }

    /// Publish `bundle` as `<analysis_id>/<version>`.
    ///
    /// Artifacts are written into a hidden staging directory and renamed into
    /// place, so readers never see a partially written version. Existing
    /// versions are never replaced.
    pub fn save_version(&self, analysis_id: &str, version: &str, bundle: &ResultBundle) -> Result<PathBuf> {
        validate_analysis_id(analysis_id)?;
        validate_version(version)?;
        let analysis_path = self.results_path.join(analysis_id);
        let version_path = analysis_path.join(version);

        if bundle.is_empty() {
            return Err(PipelineError::UnrecognizedResult(version_path));
        }

        with_dir_lock(&analysis_path, || -> Result<PathBuf> {
            if version_path.exists() {
                return Err(PipelineError::VersionExists {
                    analysis_id: analysis_id.to_string(),
                    version: version.to_string(),
                });
            }

            let staging = tempfile::Builder::new()
                .prefix(".staging-")
                .tempdir_in(&self.results_path)?;
            for (kind, artifact) in bundle.iter() {
                artifact.write_to(&staging.path().join(kind.file_name()))?;
                debug!(analysis_id, version, artifact = %kind, "artifact_staged");
            }

            publish_version(staging.path(), &analysis_path, &version_path)?;

            info!(analysis_id, version, artifacts = ?bundle.tags(), "analysis_version_saved");
            Ok(version_path.clone())
        })
    }

    fn analysis_path(&self, analysis_id: &str) -> Result<PathBuf> {
        validate_analysis_id(analysis_id)?;
        let analysis_path = self.results_path.join(analysis_id);
        if !analysis_path.is_dir() {
            return Err(PipelineError::AnalysisNotFound {
                analysis_id: analysis_id.to_string(),
                root: self.results_path.clone(),
            });
        }
        Ok(analysis_path)
    }

    /// The analysis directory, which must hold at least one version
    fn validate_analysis_path(&self, analysis_id: &str) -> Result<PathBuf> {
        let analysis_path = self.analysis_path(analysis_id)?;
        if version_names(&analysis_path)?.is_empty() {
            return Err(PipelineError::CorruptAnalysis(analysis_id.to_string()));
        }
        Ok(analysis_path)
    }

    fn get_version_path(
        &self,
        analysis_id: &str,
        analysis_path: &Path,
        version: Option<&str>,
    ) -> Result<(String, PathBuf)> {
        match version {
            Some(version) => {
                validate_version(version)?;
                let version_path = analysis_path.join(version);
                if !version_path.is_dir() {
                    return Err(PipelineError::VersionNotFound {
                        analysis_id: analysis_id.to_string(),
                        version: version.to_string(),
                    });
                }
                Ok((version.to_string(), version_path))
            }
            None => {
                let latest = version_names(analysis_path)?
                    .pop()
                    .ok_or_else(|| PipelineError::CorruptAnalysis(analysis_id.to_string()))?;
                debug!(analysis_id, version = %latest, "latest_version_resolved");
                let version_path = analysis_path.join(&latest);
                Ok((latest, version_path))
            }
        }
    }
}

/// Rename a staged version into place. An analysis directory created here is
/// removed again if the rename fails.
fn publish_version(staging: &Path, analysis_path: &Path, version_path: &Path) -> Result<()> {
    let created_analysis = !analysis_path.exists();
    std::fs::create_dir_all(analysis_path)?;
    if let Err(e) = std::fs::rename(staging, version_path) {
        // A new analysis with no versions would read as corrupt
        if created_analysis {
            if let Err(cleanup) = std::fs::remove_dir(analysis_path) {
                warn!(analysis = %analysis_path.display(), error = %cleanup, "analysis_cleanup_failed");
            }
        }
        return Err(e.into());
    }
    Ok(())
}

fn version_names(analysis_path: &Path) -> Result<Vec<String>> {
    let mut versions = Vec::new();
    for entry in std::fs::read_dir(analysis_path)? {
        let entry = entry?;
        if entry.path().is_dir() {
            versions.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    versions.sort();
    Ok(versions)
}
