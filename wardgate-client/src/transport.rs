//! Bare HTTP exchange with the backend.
//!
//! [`Transport`] performs exactly one request/response exchange. It has no
//! auth awareness and no retry logic; decoration and recovery live above it.
//! The trait seam exists so tests can script exchanges without a server.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use wardgate_core::{ApiError, Secret};

use crate::config::ClientConfig;

/// One not-yet-sent exchange: method, path, optional JSON body.
///
/// Requests are plain cloneable data, so a caller suspended on a refresh can
/// re-issue the same request once the gate releases it.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the configured base URL, e.g. `/auth/current`.
    pub path: String,
    pub body: Option<Value>,
    /// Attached by [`BearerAuth`](crate::auth::BearerAuth) at send time.
    pub bearer: Option<Secret>,
}

impl ApiRequest {
    /// A GET request for the given path.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// A POST request for the given path.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            bearer: None,
        }
    }

    /// Attach a JSON body.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Attach a bearer credential explicitly.
    pub fn with_bearer(mut self, bearer: Secret) -> Self {
        self.bearer = Some(bearer);
        self
    }
}

/// Status and raw body of one exchange, before envelope decoding.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Whether the transport-level status signals credential expiry.
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }
}

/// A single bare request/response exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and collect the response. Network failures map to
    /// [`ApiError::Network`]; any HTTP status is returned as a response.
    async fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError>;
}

/// reqwest-backed [`Transport`].
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Build a transport from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(ApiError::network)?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        // Plain concatenation: Url::join would drop the base path prefix
        // for root-relative endpoint paths.
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        let url = self.url_for(&request.path);
        tracing::debug!(method = %request.method, url = %url, "sending request");

        let mut builder = self.http.request(request.method.clone(), &url);
        if let Some(bearer) = &request.bearer {
            builder = builder.bearer_auth(bearer.expose());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(ApiError::network)?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(ApiError::network)?
            .to_vec();

        tracing::debug!(status = %status, bytes = body.len(), "received response");
        Ok(RawResponse { status, body })
    }
}
