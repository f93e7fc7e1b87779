//! Filesystem-backed content store with atomic writes

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, error};

use crate::constants::store;
use crate::errors::{StoreError, StoreResult};

use super::{validate_key, ContentStore, StoreConfig};

/// Content store keeping one file per key under a root directory
#[derive(Debug, Clone)]
pub struct LocalContentStore {
    root: PathBuf,
}

impl LocalContentStore {
    /// Open the store, creating the root directory if needed
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DirectoryNotAccessible` if the root cannot be
    /// created.
    pub async fn new(config: &StoreConfig) -> StoreResult<Self> {
        let root = config.resolve_root()?;

        if !root.exists() {
            fs::create_dir_all(&root).await.map_err(|e| {
                error!("Failed to create store directory: {}", e);
                StoreError::DirectoryNotAccessible { path: root.clone() }
            })?;
            debug!("Created store directory: {}", root.display());
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn read(&self, key: &str) -> StoreResult<Bytes> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(content) => Ok(Bytes::from(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to `{key}.tmp` then rename over the final path
    async fn write(&self, key: &str, content: Bytes) -> StoreResult<()> {
        let final_path = self.path_for(key)?;
        let temp_path = self
            .root
            .join(format!("{}{}", key, store::TEMP_FILE_SUFFIX));

        fs::write(&temp_path, &content).await.map_err(|e| {
            error!("Failed to write temporary file: {}", e);
            StoreError::Io(e)
        })?;

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            error!("Failed to rename temporary file: {}", e);
            let _ = fs::remove_file(&temp_path).await;
            return Err(StoreError::AtomicOperationFailed {
                temp_path,
                final_path,
            });
        }

        debug!("Stored {} ({} bytes)", key, content.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
