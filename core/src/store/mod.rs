//! Object store boundary.
//!
//! Artifacts (test plans, raw results, reports) live under
//! `uploads/{principal}/{filename}`. Writes under an existing key overwrite,
//! so a redelivered task that persists the same artifact twice is harmless.

mod keys;
mod memory;

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub use keys::{ArtifactKind, Principal, KEY_ROOT, TIMESTAMP_FORMAT};
pub use memory::MemoryObjectStore;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn name(&self) -> &str;

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Download an object into a local file, creating parent directories.
    async fn get_to_path(&self, key: &str, path: &Path) -> Result<(), StoreError> {
        let bytes = self.get(key).await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    key: key.to_string(),
                    source,
                })?;
        }
        tokio::fs::write(path, bytes)
            .await
            .map_err(|source| StoreError::Io {
                key: key.to_string(),
                source,
            })
    }

    async fn list(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError>;

    /// Time-limited download URL, or `None` when the backend cannot issue one.
    async fn presign(&self, key: &str, ttl: Duration) -> Result<Option<String>, StoreError>;
}
