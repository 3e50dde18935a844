//! Credential storage abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`CredentialStore`] - Trait for credential persistence backends
//! - [`MemoryStore`] - In-memory implementation for testing and development
//! - [`FileStore`] - JSON-file implementation that survives restarts
//!
//! # Atomicity
//!
//! The stored unit is the whole [`TokenPair`]: a refresh replaces it in one
//! operation, so a concurrent reader can never observe a pair with the
//! access token updated and the refresh token not yet written. Absence of a
//! stored pair is the sole source of truth for "logged out" at startup.
//!
//! # Example
//!
//! ```rust,ignore
//! use wardgate_core::{CredentialStore, MemoryStore, TokenPair};
//!
//! let store = MemoryStore::new();
//! store.save(&TokenPair::new("token")).await.unwrap();
//! let pair = store.load().await.unwrap();
//! assert_eq!(pair.unwrap().access_token.expose(), "token");
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::model::TokenPair;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the backing memory is zeroed on drop.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume the secret and return the inner value.
    pub fn into_inner(mut self) -> String {
        std::mem::take(&mut self.0)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend failed at the filesystem level.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    Backend { message: String },

    /// Serialization or deserialization of the stored pair failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Abstraction over credential persistence.
///
/// Both the request path (reading the access token for every outgoing call)
/// and the refresh gate (replacing the pair after a refresh) go through this
/// trait, so implementations must be safe to share across tasks and must
/// replace the pair atomically.
///
/// Implementations include:
/// - [`MemoryStore`] - In-memory storage for testing and development
/// - [`FileStore`] - JSON file, written atomically, persists across restarts
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Retrieve the stored pair.
    ///
    /// Returns `Ok(None)` when nothing is stored, which means logged out.
    async fn load(&self) -> Result<Option<TokenPair>, StoreError>;

    /// Replace the stored pair wholesale.
    async fn save(&self, pair: &TokenPair) -> Result<(), StoreError>;

    /// Remove the stored pair.
    ///
    /// Returns `Ok(())` even if nothing was stored.
    async fn clear(&self) -> Result<(), StoreError>;
}
