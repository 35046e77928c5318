//! JSON file storage implementation.
//!
//! Stores the snapshot as a pretty-printed JSON file and keeps a small meta
//! marker next to it (version + updated_at + iteration).

use super::{Result, StateStore};
use async_trait::async_trait;
use optiloop_core::{CycleState, Time};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Meta marker written alongside each snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    /// Number of saves so far
    pub version: u64,
    /// When the snapshot was written
    pub updated_at: Time,
    /// Iteration the snapshot was taken at
    pub iteration: u64,
}

/// File-based JSON snapshot store.
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// Create a store writing to `path`. Parent directories are created.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(Self { path })
    }

    /// Snapshot file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn meta_path(&self) -> PathBuf {
        self.path.with_extension("meta.json")
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    /// Read the meta marker, if one exists.
    pub async fn meta(&self) -> Result<Option<SnapshotMeta>> {
        match fs::read_to_string(self.meta_path()).await {
            Ok(s) => Ok(Some(serde_json::from_str(&s)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read and increment the snapshot version, return new meta.
    async fn bump_version(&self, iteration: u64) -> Result<SnapshotMeta> {
        let version = self.meta().await?.map(|m| m.version).unwrap_or(0) + 1;
        let meta = SnapshotMeta {
            version,
            updated_at: chrono::Utc::now(),
            iteration,
        };
        fs::write(self.meta_path(), serde_json::to_string_pretty(&meta)?).await?;
        Ok(meta)
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn save(&mut self, state: &CycleState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        // Readers only ever see a complete snapshot.
        let temp = self.temp_path();
        fs::write(&temp, json.as_bytes()).await?;
        fs::rename(&temp, &self.path).await?;

        let meta = self.bump_version(state.iteration).await?;
        debug!(path = %self.path.display(), version = meta.version, "state snapshot saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<CycleState>> {
        match fs::read_to_string(&self.path).await {
            Ok(s) => Ok(Some(serde_json::from_str(&s)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&mut self) -> Result<()> {
        for path in [self.path.clone(), self.meta_path()] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;
    use optiloop_core::{Metric, MetricSpec, Worker, WorkerSpec};
    use std::collections::BTreeMap;

    fn sample_state() -> CycleState {
        let mut metrics = BTreeMap::new();
        let spec = MetricSpec::maximize(0.95, 0.5, 1.0);
        metrics.insert("eff".to_string(), Metric::new("eff", &spec, 0.6, 20).unwrap());
        let workers = vec![Worker::from_spec(WorkerSpec::new("w1", "analysis", 0.9)).unwrap()];
        let mut state = CycleState::new(metrics, workers, 20);
        state.iteration = 4;
        state.score_history.push(0.63);
        state.total_value_generated = 1234.5;
        state
    }

    #[tokio::test]
    async fn test_save_and_load_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStateStore::new(dir.path().join("runs").join("state.json")).await.unwrap();

        assert!(store.load().await.unwrap().is_none());

        let state = sample_state();
        store.save(&state).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.iteration, 4);
        assert_eq!(loaded.worker_pool.len(), 1);
        assert_eq!(loaded.worker_performance.len(), 1);
        assert!((loaded.total_value_generated - 1234.5).abs() < 1e-9);
        assert!((loaded.metrics["eff"].current_value - 0.6).abs() < 1e-12);
        assert!((loaded.composite_score() - 0.63).abs() < 1e-12);

        let meta = store.meta().await.unwrap().unwrap();
        assert_eq!(meta.version, 1);
        assert_eq!(meta.iteration, 4);

        store.save(&state).await.unwrap();
        assert_eq!(store.meta().await.unwrap().unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_clear_removes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStateStore::new(dir.path().join("state.json")).await.unwrap();
        store.save(&sample_state()).await.unwrap();
        store.clear().await.unwrap();

        assert!(store.load().await.unwrap().is_none());
        assert!(store.meta().await.unwrap().is_none());
        assert!(matches!(store.load_required().await, Err(StorageError::NotFound(_))));
        // Clearing twice is fine.
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_meta_fails_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonStateStore::new(dir.path().join("state.json")).await.unwrap();
        fs::write(dir.path().join("state.meta.json"), "not json").await.unwrap();

        let err = store.save(&sample_state()).await.unwrap_err();
        assert!(matches!(err, StorageError::Json(_)));
        assert!(store.meta().await.is_err());
    }
}
