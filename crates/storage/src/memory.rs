//! In-memory snapshot store, mostly for tests and embedding.

use super::{Result, StateStore};
use async_trait::async_trait;
use optiloop_core::CycleState;

/// Keeps the latest snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Option<CycleState>,
    saves: u64,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of saves so far.
    pub fn saves(&self) -> u64 {
        self.saves
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn save(&mut self, state: &CycleState) -> Result<()> {
        self.state = Some(state.clone());
        self.saves += 1;
        Ok(())
    }

    async fn load(&self) -> Result<Option<CycleState>> {
        Ok(self.state.clone())
    }

    async fn clear(&mut self) -> Result<()> {
        self.state = None;
        Ok(())
    }
}
