//! Process-wide model registry
//!
//! Maps configured model names to artifact files and memoizes each artifact
//! the first time it is requested. Loaded artifacts are immutable and
//! shared through `Arc`; failed loads are not memoized, so a model whose
//! file appears later becomes servable without a restart.

use crate::error::ModelError;
use crate::features::FeatureSchema;
use crate::models::EvaluationResult;
use crate::observability::{ForecastMetrics, StructuredLogger};
use crate::regressor::{Estimator, ModelFamily, Regressor};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// On-disk artifact format, one JSON document per model
#[derive(Debug, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub name: String,
    pub schema: FeatureSchema,
    pub trained_at: DateTime<Utc>,
    #[serde(default)]
    pub evaluation: Option<EvaluationResult>,
    pub estimator: Estimator,
}

impl ArtifactFile {
    /// Write the artifact via a temp file and rename, so readers only ever
    /// see a complete file. Returns the SHA-256 of the written bytes.
    pub fn save(&self, path: &Path) -> Result<String> {
        let bytes = serde_json::to_vec_pretty(self).context("Failed to serialize artifact")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create model directory {:?}", parent))?;
        }

        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path)
            .with_context(|| format!("Failed to create temp artifact file {:?}", temp_path))?;
        file.write_all(&bytes).context("Failed to write artifact")?;
        file.sync_all().context("Failed to sync artifact file")?;

        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

        Ok(compute_checksum(&bytes))
    }
}

/// A loaded, validated model ready for inference
#[derive(Debug)]
pub struct ModelArtifact {
    pub name: String,
    pub family: ModelFamily,
    pub source_path: PathBuf,
    pub schema: FeatureSchema,
    pub trained_at: DateTime<Utc>,
    pub evaluation: Option<EvaluationResult>,
    /// SHA-256 hex of the artifact file
    pub checksum: String,
    pub estimator: Estimator,
}

impl ModelArtifact {
    pub fn model(&self) -> &dyn Regressor {
        &self.estimator
    }
}

/// Load status of one configured model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStatus {
    pub name: String,
    pub path: String,
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<ModelFamily>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Lazily loading, memoizing model store
pub struct ModelRegistry {
    paths: BTreeMap<String, PathBuf>,
    loaded: DashMap<String, Arc<ModelArtifact>>,
    loads: AtomicUsize,
    metrics: ForecastMetrics,
    logger: StructuredLogger,
}

impl ModelRegistry {
    pub fn new(paths: BTreeMap<String, PathBuf>) -> Self {
        Self {
            paths,
            loaded: DashMap::new(),
            loads: AtomicUsize::new(0),
            metrics: ForecastMetrics::new(),
            logger: StructuredLogger::new("registry"),
        }
    }

    /// Registry over the standard artifact names inside `dir`
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(default_model_paths(dir))
    }

    /// Return the artifact for `name`, loading it on first use
    ///
    /// The shard holding `name` stays locked during the load, so each
    /// artifact is read from storage at most once per successful load.
    pub fn get(&self, name: &str) -> Result<Arc<ModelArtifact>, ModelError> {
        let path = self.paths.get(name).ok_or_else(|| ModelError::ArtifactNotFound {
            name: name.to_string(),
            reason: "no such model configured".to_string(),
        })?;

        match self.loaded.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                debug!(model = %name, "Model registry hit");
                Ok(entry.get().clone())
            }
            Entry::Vacant(entry) => {
                self.loads.fetch_add(1, Ordering::Relaxed);
                match load_artifact(name, path) {
                    Ok(artifact) => {
                        self.metrics.inc_model_load(name, "ok");
                        self.logger.log_model_loaded(
                            name,
                            artifact.family.display_name(),
                            &path.display().to_string(),
                            &artifact.checksum,
                        );
                        Ok(entry.insert(Arc::new(artifact)).clone())
                    }
                    Err(e) => {
                        self.metrics.inc_model_load(name, load_outcome(&e));
                        self.logger.log_model_load_failed(name, &e.to_string());
                        Err(e)
                    }
                }
            }
        }
    }

    /// Every configured model name, loaded or not
    pub fn list_available(&self) -> BTreeSet<String> {
        self.paths.keys().cloned().collect()
    }

    /// Try to load every configured model
    pub fn warm_up(&self) -> BTreeMap<String, Result<Arc<ModelArtifact>, ModelError>> {
        self.paths
            .keys()
            .map(|name| (name.clone(), self.get(name)))
            .collect()
    }

    pub fn status(&self) -> Vec<ModelStatus> {
        self.paths
            .iter()
            .map(|(name, path)| {
                let loaded = self.loaded.get(name).map(|a| a.value().clone());
                ModelStatus {
                    name: name.clone(),
                    path: path.display().to_string(),
                    loaded: loaded.is_some(),
                    family: loaded.as_ref().map(|a| a.family),
                    checksum: loaded.map(|a| a.checksum.clone()),
                }
            })
            .collect()
    }

    /// Number of artifacts currently memoized
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// Number of times storage was read, successful or not
    pub fn load_attempts(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

/// `{display name → dir/file_stem.json}` for every model family
pub fn default_model_paths(dir: impl AsRef<Path>) -> BTreeMap<String, PathBuf> {
    let dir = dir.as_ref();
    ModelFamily::ALL
        .iter()
        .map(|f| {
            (
                f.display_name().to_string(),
                dir.join(format!("{}.json", f.file_stem())),
            )
        })
        .collect()
}

fn load_artifact(name: &str, path: &Path) -> Result<ModelArtifact, ModelError> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ModelError::ArtifactNotFound {
            name: name.to_string(),
            reason: format!("{} does not exist", path.display()),
        },
        _ => ModelError::ArtifactCorrupt {
            name: name.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        },
    })?;

    let file: ArtifactFile =
        serde_json::from_slice(&bytes).map_err(|e| ModelError::ArtifactCorrupt {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

    if let Some(reason) = file.schema.mismatch() {
        return Err(ModelError::SchemaMismatch {
            name: name.to_string(),
            reason,
        });
    }

    file.estimator
        .validate()
        .map_err(|reason| ModelError::ArtifactCorrupt {
            name: name.to_string(),
            reason,
        })?;

    Ok(ModelArtifact {
        name: name.to_string(),
        family: file.estimator.family(),
        source_path: path.to_path_buf(),
        schema: file.schema,
        trained_at: file.trained_at,
        evaluation: file.evaluation,
        checksum: compute_checksum(&bytes),
        estimator: file.estimator,
    })
}

fn load_outcome(e: &ModelError) -> &'static str {
    match e {
        ModelError::ArtifactNotFound { .. } => "not_found",
        ModelError::ArtifactCorrupt { .. } => "corrupt",
        ModelError::SchemaMismatch { .. } => "schema_mismatch",
    }
}

/// SHA-256 checksum as lowercase hex
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
