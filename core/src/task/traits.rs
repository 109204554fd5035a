use async_trait::async_trait;
use uuid::Uuid;

use crate::error::PipelineError;

use super::types::{TaskOutput, TaskPayload};

/// What a handler knows about the delivery it is serving.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext {
    pub task_id: Uuid,
    pub idempotency_key: Uuid,
    /// 1 on first delivery, higher after a lost worker.
    pub delivery: u32,
}

/// Executes one kind of task on a worker.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(
        &self,
        payload: TaskPayload,
        ctx: TaskContext,
    ) -> Result<TaskOutput, PipelineError>;
}

pub(crate) fn unexpected_payload(handler: &str, payload: &TaskPayload) -> PipelineError {
    PipelineError::InvalidRequest(format!(
        "{handler} cannot handle {} payloads",
        payload.kind()
    ))
}
