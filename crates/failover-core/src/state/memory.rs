// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Provides a simple, fast state store that doesn't persist across restarts.
// Useful for testing and ephemeral deployments.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - The next start begins from `engine.initial_target` with zeroed streaks

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::StateStoreConfig;
use crate::model::FailoverState;
use crate::traits::{StateStore, StateStoreFactory};

/// In-memory state store implementation
///
/// Clones share the same underlying slot, so a test can keep a handle and
/// inspect what the engine persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<Option<FailoverState>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `state`
    pub fn with_state(state: FailoverState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(state))),
        }
    }

    /// Last saved state, if any
    pub async fn snapshot(&self) -> Option<FailoverState> {
        self.inner.read().await.clone()
    }

    /// Forget the saved state
    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<Option<FailoverState>, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn save(&self, state: &FailoverState) -> Result<(), Error> {
        *self.inner.write().await = Some(state.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Factory for memory state stores
pub struct MemoryStateStoreFactory;

#[async_trait]
impl StateStoreFactory for MemoryStateStoreFactory {
    async fn create(
        &self,
        _config: &StateStoreConfig,
        _record_name: &str,
    ) -> Result<Box<dyn StateStore>, Error> {
        Ok(Box::new(MemoryStateStore::new()))
    }
}
