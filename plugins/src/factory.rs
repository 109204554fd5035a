use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use loadpilot_core::api::{
    AppConfig, ContainerRuntime, MaintenanceHandler, MaintenanceJob, ModelClient, ModelConfig,
    ObjectStore, Pipeline, SandboxExecutor, SandboxHandler, TaskExecutor, TaskKind,
    TextGenerationHandler,
};

use crate::maintenance::ScratchSweep;
use crate::model::GeminiClient;
use crate::runtime::DockerRuntime;
use crate::store::FsObjectStore;

pub fn build_model_client(cfg: &AppConfig) -> Result<Arc<dyn ModelClient>> {
    match &cfg.model {
        ModelConfig::Gemini(gemini) => {
            if gemini.api_key.trim().is_empty() {
                tracing::warn!("no Gemini API key configured; model calls will be rejected upstream");
            }
            Ok(Arc::new(GeminiClient::new(gemini)?))
        }
    }
}

pub fn build_runtime(cfg: &AppConfig) -> Arc<dyn ContainerRuntime> {
    Arc::new(DockerRuntime::new(cfg.sandbox.docker_bin.clone()))
}

pub fn build_store(cfg: &AppConfig) -> Arc<dyn ObjectStore> {
    Arc::new(FsObjectStore::new(cfg.store.root_path()))
}

pub fn build_maintenance(cfg: &AppConfig) -> Arc<dyn MaintenanceJob> {
    Arc::new(ScratchSweep::new(
        cfg.sandbox.work_dir(),
        Duration::from_secs(cfg.sandbox.scratch_max_age_secs),
    ))
}

/// Executor with every task kind wired to its concrete handler.
pub fn build_executor(cfg: &AppConfig) -> Result<TaskExecutor> {
    let model = build_model_client(cfg)?;
    let sandbox = Arc::new(SandboxExecutor::new(
        build_runtime(cfg),
        cfg.sandbox.clone(),
    ));

    Ok(TaskExecutor::builder(cfg.executor.clone())
        .handler(
            TaskKind::GenerateText,
            Arc::new(TextGenerationHandler::new(model)),
        )
        .handler(
            TaskKind::RunSandboxedExecution,
            Arc::new(SandboxHandler::new(sandbox)),
        )
        .handler(
            TaskKind::ScheduledMaintenance,
            Arc::new(MaintenanceHandler::new(build_maintenance(cfg))),
        )
        .build())
}

/// Must be called inside a tokio runtime.
pub fn build_pipeline(cfg: &AppConfig) -> Result<Pipeline> {
    let executor = build_executor(cfg)?;
    Ok(Pipeline::new(cfg, executor, build_store(cfg)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_task_kind_has_a_handler() {
        let executor = build_executor(&AppConfig::default()).unwrap();
        for kind in [
            TaskKind::GenerateText,
            TaskKind::RunSandboxedExecution,
            TaskKind::ScheduledMaintenance,
        ] {
            assert!(executor.has_handler(kind), "{kind}");
        }
    }

    #[test]
    fn store_follows_configured_root() {
        let mut cfg = AppConfig::default();
        cfg.store.root = "/var/lib/loadpilot".into();
        assert_eq!(build_store(&cfg).name(), "filesystem");
        assert_eq!(build_runtime(&cfg).name(), "docker");
    }
}
