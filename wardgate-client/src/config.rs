//! Client configuration.
//!
//! Configuration is a small TOML document; every field has a default so an
//! empty file (or none at all) is valid.
//!
//! ```toml
//! base_url = "https://papers.example.com/api/v1"
//! connect_timeout_secs = 10
//! request_timeout_secs = 30
//! credentials_path = "/var/lib/wardgate/credentials.json"
//! ```

use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file was not valid TOML for this schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Settings for building a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL the backend is mounted at, including any path prefix
    /// (e.g. `https://host/api/v1`). Endpoint paths are appended to it.
    pub base_url: Url,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Whole-request timeout in seconds. Applies to the refresh exchange
    /// too, so a hung refresh cannot park waiting callers forever.
    pub request_timeout_secs: u64,

    /// Where the token pair is persisted. `None` selects a file under the
    /// platform data directory.
    pub credentials_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://127.0.0.1:8080/api/v1")
                .expect("default base URL is valid"),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            credentials_path: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolved credentials location: the explicit path when configured,
    /// otherwise `credentials.json` under the platform data directory.
    pub fn credentials_file(&self) -> PathBuf {
        if let Some(path) = &self.credentials_path {
            return path.clone();
        }
        ProjectDirs::from("", "", "wardgate")
            .map(|dirs| dirs.data_dir().join("credentials.json"))
            .unwrap_or_else(|| PathBuf::from("wardgate-credentials.json"))
    }
}
