use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::TaskError;

use super::executor::Shared;
use super::types::{TaskKind, TaskOutput};

/// Opaque reference to a dispatched task.
pub struct TaskHandle {
    id: Uuid,
    kind: TaskKind,
    idempotency_key: Uuid,
    rx: oneshot::Receiver<Result<TaskOutput, TaskError>>,
    shared: Arc<Shared>,
}

impl TaskHandle {
    pub(crate) fn new(
        id: Uuid,
        kind: TaskKind,
        idempotency_key: Uuid,
        rx: oneshot::Receiver<Result<TaskOutput, TaskError>>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            id,
            kind,
            idempotency_key,
            rx,
            shared,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn idempotency_key(&self) -> Uuid {
        self.idempotency_key
    }

    /// Wait for the task's result for at most `timeout`.
    ///
    /// On timeout the task keeps running; whatever it eventually produces is
    /// discarded.
    pub async fn wait(self, timeout: Duration) -> Result<TaskOutput, TaskError> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TaskError::Closed),
            Err(_) => {
                self.shared.mark_timed_out(&self.id);
                tracing::warn!(
                    task_id = %self.id,
                    kind = %self.kind,
                    timeout_ms = timeout.as_millis() as u64,
                    "gave up waiting for task"
                );
                Err(TaskError::Timeout {
                    kind: self.kind,
                    after: timeout,
                })
            }
        }
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("idempotency_key", &self.idempotency_key)
            .finish()
    }
}
