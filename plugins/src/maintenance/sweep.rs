use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use loadpilot_core::api::{MaintenanceJob, MaintenanceReport};

/// Deletes sandbox staging directories older than `max_age`. Runs whose
/// caller stopped waiting leave theirs behind.
pub struct ScratchSweep {
    dir: PathBuf,
    max_age: Duration,
}

impl ScratchSweep {
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
        }
    }
}

#[async_trait]
impl MaintenanceJob for ScratchSweep {
    fn name(&self) -> &str {
        "scratch-sweep"
    }

    async fn run(&self) -> anyhow::Result<MaintenanceReport> {
        let mut report = MaintenanceReport {
            job: self.name().to_string(),
            ..MaintenanceReport::default()
        };

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                report.message = Some(format!("{} does not exist", self.dir.display()));
                return Ok(report);
            }
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_dir() {
                continue;
            }
            let age = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if age < self.max_age {
                continue;
            }
            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    tracing::warn!(dir = %entry.path().display(), error = %e, "could not remove scratch dir")
                }
            }
        }

        tracing::info!(dir = %self.dir.display(), removed = report.removed, "scratch sweep finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn removes_only_stale_directories() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("job-a")).unwrap();
        std::fs::write(root.path().join("job-a/plan.jmx"), "x").unwrap();
        std::fs::write(root.path().join("stray.txt"), "x").unwrap();

        let fresh = ScratchSweep::new(root.path(), Duration::from_secs(3600));
        assert_eq!(fresh.run().await.unwrap().removed, 0);
        assert!(root.path().join("job-a").exists());

        let eager = ScratchSweep::new(root.path(), Duration::ZERO);
        let report = eager.run().await.unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(report.job, "scratch-sweep");
        assert!(!root.path().join("job-a").exists());
        assert!(root.path().join("stray.txt").exists());
    }

    #[tokio::test]
    async fn missing_dir_is_not_an_error() {
        let root = tempfile::tempdir().unwrap();
        let sweep = ScratchSweep::new(root.path().join("never-created"), Duration::ZERO);
        let report = sweep.run().await.unwrap();
        assert_eq!(report.removed, 0);
        assert!(report.message.is_some());
    }
}
