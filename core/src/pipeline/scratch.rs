use std::path::{Path, PathBuf};

/// Per-job staging directory, removed on drop unless [`ScratchDir::keep`]
/// was called. Kept directories are left for the maintenance sweep.
pub struct ScratchDir {
    path: PathBuf,
    keep: bool,
}

impl ScratchDir {
    pub async fn create(root: &Path, job_key: &str) -> std::io::Result<Self> {
        let path = root.join(job_key);
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path, keep: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.keep {
            tracing::debug!(dir = %self.path.display(), "leaving scratch dir for maintenance");
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(dir = %self.path.display(), error = %e, "failed to remove scratch dir");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn removed_on_drop_unless_kept() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(root.path(), "a").await.unwrap();
        let a = scratch.path().to_path_buf();
        std::fs::write(a.join("plan.jmx"), "x").unwrap();
        drop(scratch);
        assert!(!a.exists());

        let mut scratch = ScratchDir::create(root.path(), "b").await.unwrap();
        let b = scratch.path().to_path_buf();
        scratch.keep();
        drop(scratch);
        assert!(b.exists());
    }
}
