//! Error taxonomy for the API client.
//!
//! The refresh gate recovers exactly one class of failure locally: a single
//! credential expiry with a refresh token available. Every other failure is
//! surfaced to the caller unchanged.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by client operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The transport was unreachable, the connection failed, or the request
    /// timed out. Never retried by the refresh gate.
    #[error("network error: {message}")]
    Network { message: String },

    /// The access credential was rejected and could not be recovered.
    #[error("unauthenticated")]
    Unauthenticated,

    /// The backend answered with an envelope code other than 200. The
    /// carried message is surfaced verbatim; no retry.
    #[error("api error {code}: {message}")]
    Application { code: i64, message: String },

    /// The refresh exchange itself failed. Terminal: the session is cleared
    /// and callers observe [`ApiError::Unauthenticated`]; this variant
    /// travels in the logs and the session-ended event reason.
    #[error("refresh exhausted: {message}")]
    RefreshExhausted { message: String },

    /// Credential storage failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Build a [`ApiError::Network`] from any displayable cause.
    pub fn network(cause: impl std::fmt::Display) -> Self {
        Self::Network {
            message: cause.to_string(),
        }
    }
}
