//! Model store: ONNX artifacts on disk, loaded on demand and cached
//!
//! Load failures never propagate out of the store. They are logged and
//! reported as `None`, and callers decide how to surface a missing model.

mod artifact;

pub use artifact::{ArtifactError, ModelArtifact};

use crate::models::ModelKey;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Outcome of loading every known artifact
#[derive(Debug, Clone, Default)]
pub struct PreloadReport {
    pub loaded: Vec<ModelKey>,
    pub failed: Vec<ModelKey>,
}

impl PreloadReport {
    pub fn all_loaded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn none_loaded(&self) -> bool {
        self.loaded.is_empty()
    }
}

/// Availability of one artifact, used for listings
#[derive(Debug, Clone)]
pub struct ArtifactStatus {
    pub key: ModelKey,
    pub path: PathBuf,
    pub error: Option<String>,
}

/// Directory of exported classifiers with a process-wide cache
#[derive(Debug)]
pub struct ModelStore {
    dir: PathBuf,
    cache: DashMap<ModelKey, Arc<ModelArtifact>>,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: DashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: ModelKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Load and optimize the artifact for `key`
    pub fn try_load(&self, key: ModelKey) -> Result<ModelArtifact, ArtifactError> {
        ModelArtifact::from_path(&self.path_for(key), key)
    }

    pub fn cached(&self, key: ModelKey) -> Option<Arc<ModelArtifact>> {
        self.cache.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    /// Get a model, loading it on first use.
    ///
    /// Returns `None` when the artifact is missing or unusable; the cause is
    /// logged. Failed loads are not cached, so a fixed file is picked up on
    /// the next request.
    pub fn get(&self, key: ModelKey) -> Option<Arc<ModelArtifact>> {
        if let Some(cached) = self.cached(key) {
            return Some(cached);
        }

        match self.try_load(key) {
            Ok(artifact) => {
                debug!(model = %key, path = ?self.path_for(key), "Model artifact loaded");
                let artifact = Arc::new(artifact);
                self.cache.insert(key, Arc::clone(&artifact));
                Some(artifact)
            }
            Err(e) => {
                error!(model = %key, error = %e, "Could not load model");
                None
            }
        }
    }

    /// [`ModelStore::get`] for async callers.
    ///
    /// A cache miss reads and optimizes the model on the blocking thread pool.
    pub async fn get_async(self: &Arc<Self>, key: ModelKey) -> Option<Arc<ModelArtifact>> {
        if let Some(cached) = self.cached(key) {
            return Some(cached);
        }

        let store = Arc::clone(self);
        match tokio::task::spawn_blocking(move || store.get(key)).await {
            Ok(artifact) => artifact,
            Err(e) => {
                error!(model = %key, error = %e, "Model load task failed");
                None
            }
        }
    }

    /// Attempt to load all six artifacts
    pub fn preload(&self) -> PreloadReport {
        let mut report = PreloadReport::default();
        for key in ModelKey::all() {
            if self.get(key).is_some() {
                report.loaded.push(key);
            } else {
                report.failed.push(key);
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            dir = ?self.dir,
            "Model preload finished"
        );
        report
    }

    pub fn loaded_count(&self) -> usize {
        self.cache.len()
    }

    /// Check every artifact without touching the cache
    pub fn statuses(&self) -> Vec<ArtifactStatus> {
        ModelKey::all()
            .map(|key| ArtifactStatus {
                key,
                path: self.path_for(key),
                error: self.try_load(key).err().map(|e| e.to_string()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Algorithm, Variant};
    use crate::testing::write_linear_classifier;

    fn lr_smote() -> ModelKey {
        ModelKey::new(Algorithm::LogisticRegression, Variant::Smote)
    }

    #[test]
    fn test_missing_artifact_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        assert!(store.get(lr_smote()).is_none());
        assert_eq!(store.loaded_count(), 0);
    }

    #[test]
    fn test_corrupt_artifact_is_none() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(lr_smote().file_name()), b"not onnx").unwrap();

        let store = ModelStore::new(dir.path());
        assert!(store.get(lr_smote()).is_none());
    }

    #[test]
    fn test_load_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        write_linear_classifier(&store.path_for(lr_smote()), &[1.0, 1.0], 0.0).unwrap();

        let first = store.get(lr_smote()).unwrap();

        // Removing the file does not evict the cached model
        std::fs::remove_file(store.path_for(lr_smote())).unwrap();
        let second = store.get(lr_smote()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.loaded_count(), 1);
    }

    #[test]
    fn test_wrong_schema_in_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let key = ModelKey::new(Algorithm::RandomForest, Variant::Smote);
        let store = ModelStore::new(dir.path());
        // Seven inputs under a two-field schema name
        write_linear_classifier(&store.path_for(key), &[0.1; 7], 0.0).unwrap();

        assert!(matches!(store.try_load(key), Err(ArtifactError::Model { .. })));
        assert!(store.get(key).is_none());
    }

    #[tokio::test]
    async fn test_async_load_populates_cache() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ModelStore::new(dir.path()));
        write_linear_classifier(&store.path_for(lr_smote()), &[1.0, 1.0], 0.0).unwrap();

        assert!(store.cached(lr_smote()).is_none());
        let loaded = store.get_async(lr_smote()).await.unwrap();
        let cached = store.cached(lr_smote()).unwrap();
        assert!(Arc::ptr_eq(&loaded, &cached));

        let missing = ModelKey::new(Algorithm::DecisionTree, Variant::Smotenc);
        assert!(store.get_async(missing).await.is_none());
    }

    #[test]
    fn test_preload_reports_partial_success() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        write_linear_classifier(&store.path_for(lr_smote()), &[1.0, 1.0], 0.0).unwrap();

        let report = store.preload();
        assert_eq!(report.loaded, vec![lr_smote()]);
        assert_eq!(report.failed.len(), 5);
        assert!(!report.all_loaded());
        assert!(!report.none_loaded());

        let statuses = store.statuses();
        assert_eq!(statuses.len(), 6);
        assert_eq!(statuses.iter().filter(|s| s.error.is_none()).count(), 1);
    }
}
