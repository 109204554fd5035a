use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::task::{unexpected_payload, TaskContext, TaskHandler, TaskOutput, TaskPayload};

use super::executor::SandboxExecutor;

/// Deterministic per task, so a redelivered run replaces the container left
/// by the earlier attempt instead of running beside it.
pub fn container_name(idempotency_key: &Uuid) -> String {
    format!("loadpilot-{}", idempotency_key.simple())
}

/// Serves `RunSandboxedExecution` tasks.
pub struct SandboxHandler {
    executor: Arc<SandboxExecutor>,
}

impl SandboxHandler {
    pub fn new(executor: Arc<SandboxExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl TaskHandler for SandboxHandler {
    fn name(&self) -> &str {
        "sandbox"
    }

    async fn handle(
        &self,
        payload: TaskPayload,
        ctx: TaskContext,
    ) -> Result<TaskOutput, PipelineError> {
        let TaskPayload::RunSandboxedExecution(req) = payload else {
            return Err(unexpected_payload(self.name(), &payload));
        };
        if ctx.delivery > 1 {
            tracing::warn!(task_id = %ctx.task_id, job_key = %req.job_key, delivery = ctx.delivery, "re-running sandboxed execution");
            // Partial output from the lost attempt.
            if let Err(e) = tokio::fs::remove_file(req.results_path()).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(e.into());
                }
            }
        }
        let name = container_name(&ctx.idempotency_key);
        let outcome = self.executor.execute(&req, &name).await?;
        Ok(TaskOutput::Execution(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_name_is_stable_per_key() {
        let key = Uuid::new_v5(&Uuid::NAMESPACE_OID, b"job");
        assert_eq!(container_name(&key), container_name(&key));
        assert!(container_name(&key).starts_with("loadpilot-"));
        assert_eq!(container_name(&key).matches('-').count(), 1);
    }
}
