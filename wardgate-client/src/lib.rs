//! # wardgate-client
//!
//! Authenticated HTTP client with transparent, single-flight credential
//! refresh.
//!
//! Many tasks can issue requests concurrently against a short-lived access
//! token. When the backend rejects the token (HTTP 401), exactly one refresh
//! exchange runs; every caller that hits the expiry meanwhile is suspended
//! and then released in arrival order, replaying with the new token, or
//! failed uniformly if the refresh itself fails.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wardgate_client::{
//!     ApiClient, ApiRequest, ClientConfig, FileStore, HttpTransport, SessionManager,
//! };
//!
//! # #[derive(serde::Deserialize)] struct Feed { items: Vec<serde_json::Value> }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let store = Arc::new(FileStore::open(config.credentials_file()).await?);
//!     let transport = Arc::new(HttpTransport::new(&config)?);
//!
//!     let client = Arc::new(ApiClient::new(transport, store));
//!     let session = SessionManager::new(client.clone());
//!
//!     session.login("alice", "password").await?;
//!
//!     // Expiry mid-flight is refreshed and replayed transparently.
//!     let feed: Feed = client.send(ApiRequest::get("/papers/feed")).await?;
//!     println!("{} papers", feed.items.len());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod session;
pub mod transport;

mod refresh;

// Re-export commonly used types at crate root
pub use auth::BearerAuth;
pub use client::ApiClient;
pub use config::{ClientConfig, ConfigError};
pub use session::{SessionEndReason, SessionEvent, SessionManager};
pub use transport::{ApiRequest, HttpTransport, RawResponse, Transport};

pub use wardgate_core::{
    ApiError, CredentialStore, FileStore, MemoryStore, Secret, StoreError, TokenPair, UserInfo,
};
