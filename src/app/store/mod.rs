//! Key-addressed content storage
//!
//! Staged downloads live under their request id and finished archives under
//! `"{digest}.zip"`. Keys are flat names: no path separators, no `..`.

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::{StoreError, StoreResult};

pub mod config;
pub mod local;
pub mod memory;

pub use config::StoreConfig;
pub use local::LocalContentStore;
pub use memory::MemoryContentStore;

/// Byte storage shared by all worker stages
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Whether an object is stored under `key`
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Read the object stored under `key`
    async fn read(&self, key: &str) -> StoreResult<Bytes>;

    /// Store `content` under `key`, replacing any existing object
    async fn write(&self, key: &str, content: Bytes) -> StoreResult<()>;

    /// Remove the object under `key`; a missing key is not an error
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Reject keys that are empty or could escape the store root
pub fn validate_key(key: &str) -> StoreResult<()> {
    let invalid = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0'])
        || key.starts_with('.');

    if invalid {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}
