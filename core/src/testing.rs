//! Fakes shared by unit and integration tests. Built for `cfg(test)` and
//! with the `test-support` feature.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::{AppConfig, ExecutorConfig};
use crate::model::{ModelClient, ModelError, TextGenerationHandler};
use crate::pipeline::Pipeline;
use crate::sandbox::{ContainerRuntime, ContainerSession, ContainerSpec, SandboxExecutor, SandboxHandler};
use crate::store::ObjectStore;
use crate::task::{TaskExecutor, TaskKind};

/// Smallest document that passes the structural check.
pub const VALID_PLAN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<jmeterTestPlan version="1.2" properties="5.0" jmeter="5.6.3">
  <hashTree>
    <TestPlan guiclass="TestPlanGui" testclass="TestPlan" testname="Login">
      <boolProp name="TestPlan.functional_mode">false</boolProp>
    </TestPlan>
    <hashTree>
      <ThreadGroup guiclass="ThreadGroupGui" testclass="ThreadGroup" testname="Users">
        <stringProp name="ThreadGroup.num_threads">5</stringProp>
      </ThreadGroup>
      <hashTree>
        <HTTPSamplerProxy guiclass="HttpTestSampleGui" testclass="HTTPSamplerProxy" testname="login">
          <stringProp name="HTTPSampler.path">/api/login</stringProp>
        </HTTPSamplerProxy>
        <hashTree/>
      </hashTree>
    </hashTree>
  </hashTree>
</jmeterTestPlan>"#;

/// [`VALID_PLAN`] with the sampler pointed at `path`.
pub fn valid_plan_for(path: &str) -> String {
    VALID_PLAN.replace("/api/login", path)
}

pub fn fenced_xml(xml: &str) -> String {
    format!("```xml\n{xml}\n```")
}

/// Replays canned responses in order; the last one repeats.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicU32,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        })
    }

    pub fn repeating(response: Result<String, String>) -> Arc<Self> {
        Self::new(vec![response])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(msg)) => Err(ModelError::Request(msg)),
            None => Err(ModelError::Empty),
        }
    }
}

pub fn small_pools() -> ExecutorConfig {
    ExecutorConfig {
        text_workers: 2,
        sandbox_workers: 1,
        scheduler_workers: 1,
        max_deliveries: 1,
        maintenance_interval_secs: 3600,
    }
}

pub fn text_executor(model: Arc<ScriptedModel>) -> TaskExecutor {
    TaskExecutor::builder(small_pools())
        .handler(
            TaskKind::GenerateText,
            Arc::new(TextGenerationHandler::new(model)),
        )
        .build()
}

/// Small pools, short waits and scratch under `work_dir`.
pub fn test_config(work_dir: &std::path::Path) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.executor = small_pools();
    cfg.executor.max_deliveries = 2;
    cfg.generation.wait_secs = 5;
    cfg.analysis.wait_secs = 5;
    cfg.sandbox.deadline_secs = 10;
    cfg.sandbox.work_dir = Some(work_dir.display().to_string());
    cfg
}

/// Pipeline wired with text and sandbox handlers over the given fakes.
pub fn build_pipeline(
    cfg: &AppConfig,
    model: Arc<dyn ModelClient>,
    runtime: Arc<dyn ContainerRuntime>,
    store: Arc<dyn ObjectStore>,
) -> Pipeline {
    let sandbox = Arc::new(SandboxExecutor::new(runtime, cfg.sandbox.clone()));
    let executor = TaskExecutor::builder(cfg.executor.clone())
        .handler(
            TaskKind::GenerateText,
            Arc::new(TextGenerationHandler::new(model)),
        )
        .handler(
            TaskKind::RunSandboxedExecution,
            Arc::new(SandboxHandler::new(sandbox)),
        )
        .build();
    Pipeline::new(cfg, executor, store)
}

/// What a fake container does when started.
#[derive(Debug, Clone, Default)]
pub struct FakeRun {
    pub exit_code: i64,
    pub console: String,
    /// Written to the read-write mount on start.
    pub results: Option<String>,
    /// Never exit.
    pub hang: bool,
}

pub struct FakeRuntime {
    run: FakeRun,
    started: Mutex<Vec<ContainerSpec>>,
    removed: Arc<Mutex<Vec<String>>>,
}

impl FakeRuntime {
    pub fn new(run: FakeRun) -> Arc<Self> {
        Arc::new(Self {
            run,
            started: Mutex::new(Vec::new()),
            removed: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn started(&self) -> Vec<ContainerSpec> {
        self.started.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    fn name(&self) -> &str {
        "fake"
    }

    async fn start(&self, spec: &ContainerSpec) -> anyhow::Result<Box<dyn ContainerSession>> {
        self.started.lock().unwrap().push(spec.clone());
        if let Some(results) = &self.run.results {
            let target = spec
                .mounts
                .iter()
                .find(|m| !m.read_only)
                .ok_or_else(|| anyhow::anyhow!("no writable mount"))?;
            std::fs::write(&target.host, results)?;
        }
        Ok(Box::new(FakeSession {
            name: spec.name.clone(),
            run: self.run.clone(),
            removed: self.removed.clone(),
        }))
    }
}

struct FakeSession {
    name: String,
    run: FakeRun,
    removed: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ContainerSession for FakeSession {
    fn id(&self) -> &str {
        &self.name
    }

    async fn wait(&mut self) -> anyhow::Result<i64> {
        if self.run.hang {
            std::future::pending::<()>().await;
        }
        Ok(self.run.exit_code)
    }

    async fn logs(&mut self) -> anyhow::Result<String> {
        Ok(self.run.console.clone())
    }

    async fn remove(&mut self) -> anyhow::Result<()> {
        self.removed.lock().unwrap().push(self.name.clone());
        Ok(())
    }
}
