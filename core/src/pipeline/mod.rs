//! The request-facing facade: generate → execute → analyze, plus artifact
//! listing and download links.

mod scratch;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::analysis::{AnalysisReport, ResultAnalyzer};
use crate::config::{AppConfig, SandboxConfig, StoreConfig};
use crate::error::{PipelineError, StoreError, TaskError};
use crate::plan::{GeneratedPlan, PlanGenerator};
use crate::sandbox::{ExecutionJob, ResourceLimits, SandboxOutcome, SandboxRequest};
use crate::store::{ArtifactKind, ObjectStore, Principal};
use crate::task::{TaskExecutor, TaskOutput, TaskPayload};

pub use scratch::ScratchDir;

/// Slack on top of the sandbox deadline before the caller stops waiting.
const SANDBOX_WAIT_GRACE: Duration = Duration::from_secs(60);

/// A finished sandboxed run.
#[derive(Debug, Clone, Serialize)]
pub struct TestRun {
    pub job: ExecutionJob,
    pub outcome: SandboxOutcome,
    /// Stored `.jtl` name, absent when the run wrote no results.
    pub results_filename: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndToEndReport {
    pub plan: GeneratedPlan,
    pub run: TestRun,
    pub report: AnalysisReport,
}

pub struct Pipeline {
    executor: TaskExecutor,
    store: Arc<dyn ObjectStore>,
    generator: PlanGenerator,
    analyzer: ResultAnalyzer,
    sandbox: SandboxConfig,
    store_cfg: StoreConfig,
}

impl Pipeline {
    /// `executor` must have handlers for text generation and sandboxed runs.
    pub fn new(cfg: &AppConfig, executor: TaskExecutor, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            generator: PlanGenerator::new(executor.clone(), store.clone(), cfg.generation.clone()),
            analyzer: ResultAnalyzer::new(executor.clone(), store.clone(), cfg.analysis.clone()),
            executor,
            store,
            sandbox: cfg.sandbox.clone(),
            store_cfg: cfg.store.clone(),
        }
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub async fn generate_plan(
        &self,
        principal: &Principal,
        description: &str,
    ) -> Result<GeneratedPlan, PipelineError> {
        self.generator.generate(principal, description).await
    }

    /// Like [`Pipeline::generate_plan`] with an explicit attempt bound.
    pub async fn generate_plan_with_attempts(
        &self,
        principal: &Principal,
        description: &str,
        max_attempts: u32,
    ) -> Result<GeneratedPlan, PipelineError> {
        self.generator
            .generate_with_attempts(principal, description, max_attempts)
            .await
    }

    /// Stage a stored plan, run it in the sandbox and upload the raw results
    /// as a fresh `test_plan_{ts}.jtl`. Earlier runs of the same plan keep
    /// their results.
    pub async fn run_test(
        &self,
        principal: &Principal,
        plan_filename: &str,
    ) -> Result<TestRun, PipelineError> {
        ArtifactKind::TestPlan.check_filename(plan_filename)?;
        let plan_key = principal.key(plan_filename);
        let results_filename = self.fresh_results_name(principal).await?;

        let job_key = Uuid::new_v4().simple().to_string();
        let mut job = ExecutionJob::new(
            job_key.clone(),
            plan_key.clone(),
            ResourceLimits::from(&self.sandbox),
        );

        let mut scratch = ScratchDir::create(&self.sandbox.work_dir(), &job_key).await?;
        self.store
            .get_to_path(&plan_key, &scratch.path().join(plan_filename))
            .await?;

        let req = SandboxRequest {
            job_key: job_key.clone(),
            staging_dir: scratch.path().to_path_buf(),
            plan_file: plan_filename.to_string(),
            results_file: results_filename.clone(),
        };

        job.start(Utc::now())
            .map_err(|e| PipelineError::InvalidRequest(e.to_string()))?;
        tracing::info!(principal = %principal, job_key = %job_key, plan = %plan_key, "test run submitted");

        let wait = Duration::from_secs(self.sandbox.deadline_secs) + SANDBOX_WAIT_GRACE;
        let result = match self.executor.submit(TaskPayload::RunSandboxedExecution(req)) {
            Ok(handle) => handle.wait(wait).await.and_then(TaskOutput::into_execution),
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                if matches!(err, TaskError::Timeout { .. }) {
                    scratch.keep();
                }
                let err = PipelineError::from(err);
                if let Err(e) = job.fail(err.to_string(), Utc::now()) {
                    tracing::warn!(job_key = %job_key, error = %e, "job already terminal");
                }
                tracing::error!(job_key = %job_key, error = %err, status = %job.status(), "test run failed");
                return Err(err);
            }
        };

        let stored = if outcome.results_present {
            let key = principal.key(&results_filename);
            let bytes = tokio::fs::read(scratch.path().join(&results_filename)).await?;
            self.store.put(&key, bytes).await?;
            Some((results_filename, key))
        } else {
            None
        };

        let (results_filename, raw_key) = match stored {
            Some((name, key)) => (Some(name), Some(key)),
            None => (None, None),
        };
        job.succeed(raw_key, outcome.summary.as_str(), outcome.finished_at)
            .map_err(|e| PipelineError::InvalidRequest(e.to_string()))?;

        tracing::info!(
            job_key = %job_key,
            exit_code = outcome.exit_code,
            duration_ms = outcome.duration_ms,
            results = results_filename.as_deref().unwrap_or("-"),
            "test run finished"
        );

        Ok(TestRun {
            job,
            outcome,
            results_filename,
        })
    }

    pub async fn analyze_results(
        &self,
        principal: &Principal,
        results_filename: &str,
    ) -> Result<AnalysisReport, PipelineError> {
        self.analyzer.analyze(principal, results_filename).await
    }

    /// Filenames of one artifact kind owned by `principal`.
    pub async fn list_artifacts(
        &self,
        principal: &Principal,
        kind: ArtifactKind,
    ) -> Result<Vec<String>, PipelineError> {
        let prefix = principal.prefix();
        let suffix = format!(".{}", kind.extension());
        let keys = self.store.list(&prefix).await?;
        Ok(keys
            .iter()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|name| name.ends_with(&suffix) && !name.contains('/'))
            .map(str::to_string)
            .collect())
    }

    pub async fn download_url(
        &self,
        principal: &Principal,
        filename: &str,
    ) -> Result<String, PipelineError> {
        let kind = filename
            .rsplit_once('.')
            .and_then(|(_, ext)| ArtifactKind::from_extension(ext))
            .ok_or_else(|| {
                PipelineError::InvalidRequest(format!("'{filename}' is not a downloadable artifact"))
            })?;
        kind.check_filename(filename)?;

        let key = principal.key(filename);
        let ttl = Duration::from_secs(self.store_cfg.presign_ttl_secs);
        self.store
            .presign(&key, ttl)
            .await?
            .ok_or_else(|| StoreError::NotFound(key).into())
    }

    /// Generate, run and analyze in sequence. The first failure aborts.
    pub async fn run_end_to_end(
        &self,
        principal: &Principal,
        description: &str,
    ) -> Result<EndToEndReport, PipelineError> {
        let plan = self.generate_plan(principal, description).await?;
        let run = self.run_test(principal, &plan.filename).await?;
        let Some(results) = run.results_filename.as_deref() else {
            return Err(PipelineError::MalformedInput(
                "sandbox run produced no results to analyze".into(),
            ));
        };
        let report = self.analyze_results(principal, results).await?;
        Ok(EndToEndReport { plan, run, report })
    }
}

impl Pipeline {
    async fn fresh_results_name(&self, principal: &Principal) -> Result<String, PipelineError> {
        let existing = self.store.list(&principal.prefix()).await?;
        let base = ArtifactKind::RawResults.filename_now();
        Ok(unused_name(&base, |name| existing.contains(&principal.key(name))))
    }
}

/// `base` itself, or `{stem}_{n}.{ext}` with the lowest free `n` from 2.
fn unused_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let (stem, ext) = base.rsplit_once('.').unwrap_or((base, ""));
    let mut n = 2u32;
    loop {
        let candidate = format!("{stem}_{n}.{ext}");
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::is_valid_test_plan;
    use crate::store::MemoryObjectStore;
    use crate::testing::{build_pipeline, test_config, FakeRun, FakeRuntime, ScriptedModel, VALID_PLAN};
    use pretty_assertions::assert_eq;

    struct Fixture {
        pipeline: Pipeline,
        store: Arc<MemoryObjectStore>,
        runtime: Arc<FakeRuntime>,
        work: tempfile::TempDir,
    }

    fn fixture(model: Arc<ScriptedModel>, run: FakeRun) -> Fixture {
        let work = tempfile::tempdir().unwrap();
        let cfg = test_config(work.path());
        let runtime = FakeRuntime::new(run);
        let store = Arc::new(MemoryObjectStore::new());
        Fixture {
            pipeline: build_pipeline(&cfg, model, runtime.clone(), store.clone()),
            store,
            runtime,
            work,
        }
    }

    fn login_results(rows: usize) -> String {
        let mut jtl = String::from("timeStamp,elapsed,label,responseCode,success,allThreads\n");
        for i in 0..rows {
            let code = if i % 10 == 0 { "500" } else { "200" };
            jtl.push_str(&format!("{},{},login,{code},true,5\n", 1_700_000_000_000u64 + i as u64, 100 + i));
        }
        jtl
    }

    #[test]
    fn unused_name_skips_taken_names() {
        let base = "test_plan_01-02-2026_10-00-00.jtl";
        assert_eq!(unused_name(base, |_| false), base);
        let taken = ["test_plan_01-02-2026_10-00-00.jtl", "test_plan_01-02-2026_10-00-00_2.jtl"];
        assert_eq!(
            unused_name(base, |n| taken.contains(&n)),
            "test_plan_01-02-2026_10-00-00_3.jtl"
        );
    }

    #[tokio::test]
    async fn rerunning_a_plan_keeps_earlier_results() {
        let fx = fixture(
            ScriptedModel::repeating(Ok("unused".into())),
            FakeRun {
                exit_code: 0,
                console: "summary =     3 in 00:00:01 =    3.0/s\n".into(),
                results: Some(login_results(3)),
                hang: false,
            },
        );
        let principal = Principal::new("carol").unwrap();
        fx.store
            .put(&principal.key("test_plan_01-02-2026_10-00-00.jmx"), VALID_PLAN.as_bytes().to_vec())
            .await
            .unwrap();

        let first = fx
            .pipeline
            .run_test(&principal, "test_plan_01-02-2026_10-00-00.jmx")
            .await
            .unwrap();
        let second = fx
            .pipeline
            .run_test(&principal, "test_plan_01-02-2026_10-00-00.jmx")
            .await
            .unwrap();

        assert_ne!(first.results_filename, second.results_filename);
        let jtl = fx.pipeline.list_artifacts(&principal, ArtifactKind::RawResults).await.unwrap();
        assert_eq!(jtl.len(), 2);
        assert!(jtl.iter().all(|name| name.starts_with("test_plan_")));
    }

    #[tokio::test]
    async fn end_to_end_login_flow() {
        let plan = VALID_PLAN;
        let model = ScriptedModel::new(vec![
            Ok(format!("```xml\n{plan}\n```")),
            Ok("Login latency is stable.".into()),
        ]);
        let fx = fixture(
            model.clone(),
            FakeRun {
                exit_code: 0,
                console: "summary =     50 in 00:00:05 =   10.0/s\n".into(),
                results: Some(login_results(50)),
                hang: false,
            },
        );
        let principal = Principal::new("alice").unwrap();

        let e2e = fx
            .pipeline
            .run_end_to_end(&principal, "a login flow hitting /api/login 50 times")
            .await
            .unwrap();

        assert_eq!(e2e.plan.artifact.attempt_count, 1);
        assert!(is_valid_test_plan(&e2e.plan.artifact.content));
        assert_eq!(e2e.run.job.status(), crate::sandbox::JobStatus::Succeeded);
        assert_eq!(e2e.run.outcome.summary.as_str(), "summary =     50 in 00:00:05 =   10.0/s");
        let rows = &e2e.report.source_metrics;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "login");
        assert_eq!(rows[0].throughput, 50);
        assert_eq!(rows[0].error_rate_pct, 10.0);
        assert_eq!(rows[0].avg_response_time_ms, 124.5);
        assert_eq!(rows[0].concurrent_users, 5);
        assert_eq!(e2e.report.narrative_text, "Login latency is stable.");

        let jtl = fx.pipeline.list_artifacts(&principal, ArtifactKind::RawResults).await.unwrap();
        assert_eq!(jtl, vec![e2e.run.results_filename.clone().unwrap()]);
        assert_eq!(fx.store.len(), 3);
        assert_eq!(fx.runtime.started().len(), 1);
        // Scratch dir is gone once the run is over.
        assert_eq!(std::fs::read_dir(fx.work.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failed_run_uploads_nothing() {
        let fx = fixture(
            ScriptedModel::repeating(Ok("unused".into())),
            FakeRun {
                exit_code: 2,
                console: "An error occurred: plan broken\n".into(),
                results: Some(login_results(3)),
                hang: false,
            },
        );
        let principal = Principal::new("bob").unwrap();
        fx.store
            .put(&principal.key("plan.jmx"), b"<jmeterTestPlan/>".to_vec())
            .await
            .unwrap();

        let err = fx.pipeline.run_test(&principal, "plan.jmx").await.unwrap_err();

        assert_eq!(err.error_code().as_str(), "SANDBOX_FAILURE");
        assert!(fx
            .pipeline
            .list_artifacts(&principal, ArtifactKind::RawResults)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn lists_by_kind_and_presigns() {
        let fx = fixture(ScriptedModel::repeating(Ok("x".into())), FakeRun::default());
        let alice = Principal::new("alice").unwrap();
        for name in ["a.jmx", "a.jtl", "b.jmx", "analysis_x.md"] {
            fx.store.put(&alice.key(name), vec![1]).await.unwrap();
        }
        fx.store
            .put(&Principal::new("eve").unwrap().key("c.jmx"), vec![1])
            .await
            .unwrap();

        let plans = fx.pipeline.list_artifacts(&alice, ArtifactKind::TestPlan).await.unwrap();
        assert_eq!(plans, vec!["a.jmx".to_string(), "b.jmx".to_string()]);

        let url = fx.pipeline.download_url(&alice, "a.jtl").await.unwrap();
        assert!(url.contains("uploads/alice/a.jtl"));
        assert!(matches!(
            fx.pipeline.download_url(&alice, "missing.md").await,
            Err(PipelineError::Store(StoreError::NotFound(_)))
        ));
        assert!(matches!(
            fx.pipeline.download_url(&alice, "notes.txt").await,
            Err(PipelineError::InvalidRequest(_))
        ));
    }
}
