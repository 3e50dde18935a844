//! # wardgate-core
//!
//! Domain types and credential storage for the wardgate API client.
//!
//! This crate provides:
//! - The wire-level data model: token pairs, user identity, and the
//!   `{code, message, data}` response envelope the backend wraps every
//!   payload in
//! - The [`CredentialStore`] trait with in-memory and file-backed
//!   implementations
//! - The [`ApiError`] taxonomy shared by the whole client
//!
//! It deliberately carries no HTTP dependency; everything network-facing
//! lives in `wardgate-client`.
//!
//! ## Quick Start
//!
//! ```rust
//! use wardgate_core::{CredentialStore, MemoryStore, TokenPair};
//!
//! # async fn example() -> Result<(), wardgate_core::StoreError> {
//! let store = MemoryStore::new();
//! let pair = TokenPair::new("access-token").with_refresh_token("refresh-token");
//! store.save(&pair).await?;
//! assert!(store.load().await?.is_some());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod model;
pub mod store;

// Re-export commonly used types at crate root
pub use error::ApiError;

pub use model::{
    CODE_OK,
    Envelope,
    LoginRequest,
    LoginResponse,
    RefreshRequest,
    RefreshResponse,
    RegisterRequest,
    TokenPair,
    UserInfo,
};

pub use store::{
    CredentialStore,
    FileStore,
    MemoryStore,
    Secret,
    StoreError,
};
