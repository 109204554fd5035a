use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use loadpilot_core::api::{ObjectStore, StoreError};

/// Object store rooted at a local directory. Keys map to relative paths.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(key);
        let clean = !key.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

fn io_err(key: &str) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(key.to_string())
        } else {
            StoreError::Io {
                key: key.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_err(key))?;
        }
        // Write-then-rename so readers never see a half-written object.
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, bytes).await.map_err(io_err(key))?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(io_err(key))
    }

    async fn list(&self, prefix: &str) -> Result<BTreeSet<String>, StoreError> {
        let mut keys = BTreeSet::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_err(prefix)(e)),
            };
            while let Some(entry) = entries.next_entry().await.map_err(io_err(prefix))? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(io_err(prefix))?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(rel) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) && !key.contains(".tmp-") {
                    keys.insert(key);
                }
            }
        }
        Ok(keys)
    }

    /// `file://` URL with an `expires` unix timestamp. Nothing enforces the
    /// expiry locally; it mirrors what a remote store would hand out.
    async fn presign(&self, key: &str, ttl: Duration) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        if !tokio::fs::try_exists(&path).await.map_err(io_err(key))? {
            return Ok(None);
        }
        let absolute = match path.canonicalize() {
            Ok(p) => p,
            Err(_) => path,
        };
        let expires = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(Some(format!(
            "file://{}?expires={expires}",
            absolute.display()
        )))
    }
}
