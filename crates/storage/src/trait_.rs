//! Storage trait abstraction.

use async_trait::async_trait;
use optiloop_core::CycleState;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Storage abstraction for cycle state snapshots.
///
/// This trait allows different storage backends to be plugged in.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Save a snapshot, replacing any previous one.
    async fn save(&mut self, state: &CycleState) -> Result<()>;

    /// Load the latest snapshot, if any.
    async fn load(&self) -> Result<Option<CycleState>>;

    /// Remove the stored snapshot.
    async fn clear(&mut self) -> Result<()>;

    /// Load the latest snapshot or fail with `NotFound`.
    async fn load_required(&self) -> Result<CycleState> {
        self.load()
            .await?
            .ok_or_else(|| StorageError::NotFound("no saved cycle state".to_string()))
    }
}
