//! Wire-level data model.
//!
//! This module defines the shapes the backend actually speaks:
//! - [`TokenPair`] - the access/refresh credential, replaced wholesale on refresh
//! - [`UserInfo`] - the session subject
//! - [`Envelope`] - the `{code, message, data}` wrapper around every payload
//! - Request/response bodies for the auth endpoints
//!
//! All wire field names are camelCase.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::store::Secret;

/// Envelope code the backend uses for success. Any other code is an
/// application-level failure, even when the HTTP status is 200.
pub const CODE_OK: i64 = 200;

/// The access/refresh credential issued at login.
///
/// A pair is an immutable value: a successful refresh produces a new pair
/// that replaces the stored one wholesale, never a field-by-field update
/// while a request is in flight with the old one. `refreshed_at` records
/// when the pair was minted; the backend carries no explicit expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived token authorizing API calls.
    pub access_token: Secret,

    /// Longer-lived token exchanged for a new access token. Absent pairs
    /// cannot be refreshed; expiry is then terminal.
    pub refresh_token: Option<Secret>,

    /// When this pair was issued or last refreshed.
    pub refreshed_at: DateTime<Utc>,
}

impl TokenPair {
    /// Create a pair holding only an access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token),
            refresh_token: None,
            refreshed_at: Utc::now(),
        }
    }

    /// Attach a refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(Secret::new(refresh_token));
        self
    }
}

/// The authenticated subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: u64,
    pub username: String,
    /// Unknown at login time; populated by the current-user endpoint.
    #[serde(default)]
    pub email: Option<String>,
    pub role: String,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Payload of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: u64,
    pub username: String,
    pub role: String,
}

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Body of `POST /auth/refresh`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Payload of a successful refresh. The backend may omit the new refresh
/// token, in which case the old one stays valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Standard response envelope: `{code, message, data}`.
///
/// HTTP status and envelope code are distinct signals: HTTP 401 marks
/// credential expiry and is handled before envelope decoding; a non-200
/// envelope code on HTTP 200 is an application failure and never triggers
/// a refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Whether the envelope carries a success code.
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }

    /// Unwrap the payload, surfacing non-200 codes verbatim.
    pub fn into_data(self) -> Result<T, ApiError> {
        if !self.is_ok() {
            return Err(ApiError::Application {
                code: self.code,
                message: self.message,
            });
        }
        self.data.ok_or_else(|| {
            ApiError::Decode(serde_json::Error::custom(
                "envelope with code 200 carried no data",
            ))
        })
    }

    /// Check the code and discard any payload. For endpoints like logout
    /// whose data is empty or irrelevant.
    pub fn into_unit(self) -> Result<(), ApiError> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(ApiError::Application {
                code: self.code,
                message: self.message,
            })
        }
    }
}
