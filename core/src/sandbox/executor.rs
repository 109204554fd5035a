use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::config::SandboxConfig;
use crate::error::PipelineError;

use super::runtime::{ContainerRuntime, ContainerSpec, Mount, CONTAINER_DATA_DIR};
use super::summary::ExecutionSummary;
use super::types::{ResourceLimits, SandboxOutcome, SandboxRequest};

pub const PROPERTIES_FILE: &str = "minimal.properties";
pub const MINIMAL_PROPERTIES: &str = include_str!("minimal.properties");

/// Runs staged test plans in throwaway containers.
pub struct SandboxExecutor {
    runtime: Arc<dyn ContainerRuntime>,
    cfg: SandboxConfig,
}

impl SandboxExecutor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, cfg: SandboxConfig) -> Self {
        Self { runtime, cfg }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.cfg
    }

    pub fn limits(&self) -> ResourceLimits {
        ResourceLimits::from(&self.cfg)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.cfg.deadline_secs)
    }

    pub fn container_spec(&self, req: &SandboxRequest, name: &str) -> ContainerSpec {
        let data = |file: &str| format!("{CONTAINER_DATA_DIR}/{file}");
        ContainerSpec {
            name: name.to_string(),
            image: self.cfg.image.clone(),
            args: vec![
                "-n".into(),
                "-t".into(),
                data(&req.plan_file),
                "-l".into(),
                data(&req.results_file),
                "-q".into(),
                data(PROPERTIES_FILE),
            ],
            mounts: vec![
                Mount {
                    host: req.plan_path(),
                    container: data(&req.plan_file),
                    read_only: true,
                },
                Mount {
                    host: req.results_path(),
                    container: data(&req.results_file),
                    read_only: false,
                },
                Mount {
                    host: req.staging_dir.join(PROPERTIES_FILE),
                    container: data(PROPERTIES_FILE),
                    read_only: true,
                },
            ],
            limits: self.limits(),
        }
    }

    /// Run one staged plan to completion.
    ///
    /// Non-zero exit, a failed start and an expired deadline are all
    /// `SandboxFailure` carrying whatever console output was collected. The
    /// container is removed on every path once it has started.
    pub async fn execute(
        &self,
        req: &SandboxRequest,
        container_name: &str,
    ) -> Result<SandboxOutcome, PipelineError> {
        self.prepare(req).await?;
        let spec = self.container_spec(req, container_name);

        if let Err(e) = self.runtime.remove_stale(&spec.name).await {
            tracing::warn!(job_key = %req.job_key, container = %spec.name, error = %e, "stale container cleanup failed");
        }

        let started_at = Utc::now();
        let clock = Instant::now();
        let mut session = self.runtime.start(&spec).await.map_err(|e| {
            PipelineError::sandbox(None, format!("container failed to start: {e:#}"), String::new())
        })?;

        tracing::info!(
            job_key = %req.job_key,
            container = %session.id(),
            image = %spec.image,
            memory = %spec.limits.memory,
            cpu_shares = spec.limits.cpu_shares,
            "sandbox run started"
        );

        let waited = tokio::time::timeout(self.deadline(), session.wait()).await;

        let console = match session.logs().await {
            Ok(console) => console,
            Err(e) => {
                tracing::warn!(job_key = %req.job_key, error = %e, "could not collect container output");
                String::new()
            }
        };
        if let Err(e) = session.remove().await {
            tracing::warn!(job_key = %req.job_key, container = %session.id(), error = %e, "container teardown failed");
        }

        let finished_at = Utc::now();
        let duration_ms = clock.elapsed().as_millis() as u64;

        let exit_code = match waited {
            Err(_) => {
                tracing::error!(job_key = %req.job_key, deadline_secs = self.cfg.deadline_secs, duration_ms, "sandbox deadline exceeded");
                return Err(PipelineError::sandbox(None, "deadline exceeded", console));
            }
            Ok(Err(e)) => {
                tracing::error!(job_key = %req.job_key, error = %e, "waiting for container failed");
                return Err(PipelineError::sandbox(
                    None,
                    format!("container wait failed: {e:#}"),
                    console,
                ));
            }
            Ok(Ok(code)) => code,
        };

        if exit_code != 0 {
            tracing::error!(job_key = %req.job_key, exit_code, duration_ms, "sandbox run failed");
            return Err(PipelineError::sandbox(
                Some(exit_code),
                "non-zero exit code",
                console,
            ));
        }

        let results_present = non_empty_file(&req.results_path()).await;
        if !results_present {
            if self.cfg.require_results {
                tracing::error!(job_key = %req.job_key, "sandbox exited cleanly without results");
                return Err(PipelineError::sandbox(
                    Some(exit_code),
                    "results file missing",
                    console,
                ));
            }
            tracing::warn!(job_key = %req.job_key, results = %req.results_path().display(), "exit code 0 but no results were written");
        }

        tracing::info!(job_key = %req.job_key, exit_code, duration_ms, results_present, "sandbox run finished");

        Ok(SandboxOutcome {
            exit_code,
            summary: ExecutionSummary::from_console(&console, &self.cfg.summary_marker),
            results_present,
            started_at,
            finished_at,
            duration_ms,
        })
    }

    /// Check the plan is staged, create the empty results file (so the bind
    /// mount is a file, not a directory) and drop the properties file next to
    /// them.
    async fn prepare(&self, req: &SandboxRequest) -> Result<(), PipelineError> {
        if !tokio::fs::try_exists(req.plan_path()).await? {
            return Err(PipelineError::InvalidRequest(format!(
                "test plan not staged at {}",
                req.plan_path().display()
            )));
        }

        let results = req.results_path();
        if non_empty_file(&results).await {
            return Err(PipelineError::InvalidRequest(format!(
                "results location {} already holds data",
                results.display()
            )));
        }
        tokio::fs::write(&results, b"").await?;

        let properties = match self.properties_source() {
            Some(path) => tokio::fs::read(&path).await?,
            None => MINIMAL_PROPERTIES.as_bytes().to_vec(),
        };
        tokio::fs::write(req.staging_dir.join(PROPERTIES_FILE), properties).await?;
        Ok(())
    }

    fn properties_source(&self) -> Option<PathBuf> {
        self.cfg
            .properties_file
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| PathBuf::from(shellexpand::tilde(s).as_ref()))
    }
}

async fn non_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::NO_SUMMARY;
    use crate::testing::{FakeRun, FakeRuntime};
    use pretty_assertions::assert_eq;

    fn staged(dir: &Path) -> SandboxRequest {
        std::fs::write(dir.join("plan.jmx"), "<jmeterTestPlan/>").unwrap();
        SandboxRequest {
            job_key: "job-1".into(),
            staging_dir: dir.to_path_buf(),
            plan_file: "plan.jmx".into(),
            results_file: "plan.jtl".into(),
        }
    }

    fn executor(runtime: Arc<FakeRuntime>, cfg: SandboxConfig) -> SandboxExecutor {
        SandboxExecutor::new(runtime, cfg)
    }

    #[test]
    fn spec_mounts_plan_and_properties_read_only() {
        let exec = executor(FakeRuntime::new(FakeRun::default()), SandboxConfig::default());
        let req = SandboxRequest {
            job_key: "j".into(),
            staging_dir: PathBuf::from("/scratch/j"),
            plan_file: "p.jmx".into(),
            results_file: "p.jtl".into(),
        };
        let spec = exec.container_spec(&req, "loadpilot-j");
        assert_eq!(
            spec.args,
            vec![
                "-n",
                "-t",
                "/data/p.jmx",
                "-l",
                "/data/p.jtl",
                "-q",
                "/data/minimal.properties"
            ]
        );
        let modes: Vec<(&str, bool)> = spec
            .mounts
            .iter()
            .map(|m| (m.container.as_str(), m.read_only))
            .collect();
        assert_eq!(
            modes,
            vec![
                ("/data/p.jmx", true),
                ("/data/p.jtl", false),
                ("/data/minimal.properties", true)
            ]
        );
        assert_eq!(spec.limits.memory, "1g");
        assert_eq!(spec.limits.cpu_shares, 512);
        assert_eq!(spec.image, "my-jmeter:5.6.3");
    }

    #[tokio::test]
    async fn clean_exit_with_results_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let req = staged(dir.path());
        let runtime = FakeRuntime::new(FakeRun {
            exit_code: 0,
            console: "Starting\nsummary = 10 in 00:00:01\nTidying up\n".into(),
            results: Some("label,elapsed\n".into()),
            ..FakeRun::default()
        });

        let outcome = executor(runtime.clone(), SandboxConfig::default())
            .execute(&req, "loadpilot-job-1")
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.results_present);
        assert_eq!(outcome.summary.as_str(), "summary = 10 in 00:00:01");
        assert!(outcome.finished_at >= outcome.started_at);
        assert_eq!(runtime.removed(), vec!["loadpilot-job-1".to_string()]);
        let props = std::fs::read_to_string(dir.path().join(PROPERTIES_FILE)).unwrap();
        assert!(props.contains("summariser.name=summary"));
    }

    #[tokio::test]
    async fn non_zero_exit_fails_even_with_results() {
        let dir = tempfile::tempdir().unwrap();
        let req = staged(dir.path());
        let runtime = FakeRuntime::new(FakeRun {
            exit_code: 1,
            console: "Error in NonGUIDriver\n".into(),
            results: Some("label,elapsed\nlogin,10\n".into()),
            ..FakeRun::default()
        });

        let err = executor(runtime.clone(), SandboxConfig::default())
            .execute(&req, "c")
            .await
            .unwrap_err();

        match err {
            PipelineError::SandboxFailure {
                exit_code, console, ..
            } => {
                assert_eq!(exit_code, Some(1));
                assert!(console.contains("NonGUIDriver"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(runtime.removed().len(), 1);
    }

    #[tokio::test]
    async fn clean_exit_without_results_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        let req = staged(dir.path());
        let run = FakeRun {
            exit_code: 0,
            results: None,
            ..FakeRun::default()
        };

        let outcome = executor(FakeRuntime::new(run.clone()), SandboxConfig::default())
            .execute(&req, "c")
            .await
            .unwrap();
        assert!(!outcome.results_present);
        assert_eq!(outcome.summary.as_str(), NO_SUMMARY);

        let strict = SandboxConfig {
            require_results: true,
            ..SandboxConfig::default()
        };
        let err = executor(FakeRuntime::new(run), strict)
            .execute(&req, "c")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::SandboxFailure {
                exit_code: Some(0),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn deadline_tears_container_down() {
        let dir = tempfile::tempdir().unwrap();
        let req = staged(dir.path());
        let runtime = FakeRuntime::new(FakeRun {
            hang: true,
            console: "still running\n".into(),
            ..FakeRun::default()
        });
        let cfg = SandboxConfig {
            deadline_secs: 0,
            ..SandboxConfig::default()
        };

        let err = executor(runtime.clone(), cfg)
            .execute(&req, "hung")
            .await
            .unwrap_err();

        match err {
            PipelineError::SandboxFailure {
                exit_code, reason, ..
            } => {
                assert_eq!(exit_code, None);
                assert_eq!(reason, "deadline exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(runtime.removed(), vec!["hung".to_string()]);
    }

    #[tokio::test]
    async fn refuses_unstaged_plan_and_used_results_location() {
        let dir = tempfile::tempdir().unwrap();
        let exec = executor(FakeRuntime::new(FakeRun::default()), SandboxConfig::default());
        let missing = SandboxRequest {
            job_key: "j".into(),
            staging_dir: dir.path().to_path_buf(),
            plan_file: "absent.jmx".into(),
            results_file: "absent.jtl".into(),
        };
        assert!(matches!(
            exec.execute(&missing, "c").await,
            Err(PipelineError::InvalidRequest(_))
        ));

        let req = staged(dir.path());
        std::fs::write(req.results_path(), "old results").unwrap();
        assert!(matches!(
            exec.execute(&req, "c").await,
            Err(PipelineError::InvalidRequest(_))
        ));
    }
}
