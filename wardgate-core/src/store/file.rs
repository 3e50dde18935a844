//! File-backed credential storage implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{CredentialStore, StoreError};
use crate::model::TokenPair;

/// JSON-file credential store.
///
/// The pair is serialized to a single JSON document. Writes go to a
/// temporary sibling file that is renamed into place, so a reader in another
/// process sees either the old pair or the new one, never a torn write.
/// Within the process an `RwLock`-guarded cache backs [`load`], so the disk
/// is only touched on open, save, and clear.
///
/// [`load`]: CredentialStore::load
pub struct FileStore {
    path: PathBuf,
    cached: RwLock<Option<TokenPair>>,
}

impl FileStore {
    /// Open a store at the given path, reading any persisted pair.
    ///
    /// A missing file means logged out; a present but unreadable file is an
    /// error rather than a silent logout.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let cached = match tokio::fs::read(&path).await {
            Ok(bytes) => Some(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        tracing::debug!(
            path = %path.display(),
            stored = cached.is_some(),
            "opened credential file store"
        );
        Ok(Self {
            path,
            cached: RwLock::new(cached),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("stored", &self.cached.read().is_some())
            .finish()
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn load(&self) -> Result<Option<TokenPair>, StoreError> {
        Ok(self.cached.read().clone())
    }

    async fn save(&self, pair: &TokenPair) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(pair)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        *self.cached.write() = Some(pair.clone());
        tracing::debug!(path = %self.path.display(), "persisted credential pair");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        self.cached.write().take();
        tracing::debug!(path = %self.path.display(), "cleared credential file store");
        Ok(())
    }
}
