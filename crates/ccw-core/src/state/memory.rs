// # Memory State Store
//
// In-memory implementation of StateStore.
//
// Nothing survives the process, so every run behaves like a first run and
// triggers an apply. Useful for tests and for dry runs against a live
// interface.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::traits::state_store::StateStore;
use crate::Error;

/// In-memory state store implementation
///
/// Clones share the same slot, so a test can keep a handle and inspect what
/// the engine wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<Option<String>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds an address
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(address.into()))),
        }
    }

    /// Current contents
    pub async fn get(&self) -> Option<String> {
        self.inner.read().await.clone()
    }

    /// Forget the stored address
    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn read(&self) -> Result<Option<String>, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn write(&self, address: &str) -> Result<(), Error> {
        *self.inner.write().await = Some(address.to_string());
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
