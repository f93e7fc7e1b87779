//! Content store configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::store;
use crate::errors::{StoreError, StoreResult};

/// Configuration for the local content store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory for stored objects (OS cache dir if None)
    pub root: Option<PathBuf>,
}

impl StoreConfig {
    /// Create a store configuration with an explicit root
    pub fn with_root(root: PathBuf) -> Self {
        Self { root: Some(root) }
    }

    /// Root directory to use, resolving the OS default if unset
    ///
    /// - Linux: ~/.cache/safezip
    /// - macOS: ~/Library/Caches/safezip
    /// - Windows: %LOCALAPPDATA%/safezip
    pub fn resolve_root(&self) -> StoreResult<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => Self::default_root(),
        }
    }

    fn default_root() -> StoreResult<PathBuf> {
        let cache_dir = dirs::cache_dir().ok_or_else(|| StoreError::DirectoryNotAccessible {
            path: PathBuf::from("system cache directory"),
        })?;
        Ok(cache_dir.join(store::DEFAULT_DIR_NAME))
    }
}
