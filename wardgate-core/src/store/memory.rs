//! In-memory credential storage implementation.

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{CredentialStore, StoreError};
use crate::model::TokenPair;

/// In-memory credential store for testing and development.
///
/// Not persistent; the pair is lost when the process exits.
///
/// # Thread Safety
///
/// Uses interior mutability via `RwLock` and is safe to share across tasks.
/// `save` replaces the whole pair under one write lock, so readers never
/// observe a torn update.
pub struct MemoryStore {
    pair: RwLock<Option<TokenPair>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            pair: RwLock::new(None),
        }
    }

    /// Create a memory store pre-populated with a pair.
    pub fn with_pair(pair: TokenPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("stored", &self.pair.read().is_some())
            .finish()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        Ok(self.pair.read().clone())
    }

    async fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        *self.pair.write() = Some(pair.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.pair.write().take();
        Ok(())
    }
}
