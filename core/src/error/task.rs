use std::time::Duration;

use thiserror::Error;

use super::pipeline::PipelineError;
use crate::task::TaskKind;

/// Errors surfaced through a task handle.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The caller's wait budget elapsed. The task is not cancelled.
    #[error("{kind} task timed out after {}s", .after.as_secs())]
    Timeout { kind: TaskKind, after: Duration },

    /// The handler ran and returned a typed failure.
    #[error("task failed: {0}")]
    Failed(PipelineError),

    /// The worker died mid-task on every delivery.
    #[error("{kind} worker lost after {deliveries} deliveries")]
    WorkerLost { kind: TaskKind, deliveries: u32 },

    #[error("no handler registered for {0} tasks")]
    NoHandler(TaskKind),

    #[error("{kind} task returned an unexpected output")]
    UnexpectedOutput { kind: TaskKind },

    #[error("task executor closed")]
    Closed,
}

impl TaskError {
    pub fn stage_name(kind: TaskKind) -> &'static str {
        match kind {
            TaskKind::GenerateText => "text generation",
            TaskKind::RunSandboxedExecution => "sandboxed execution",
            TaskKind::ScheduledMaintenance => "scheduled maintenance",
        }
    }
}

impl From<TaskError> for PipelineError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Failed(inner) => inner,
            TaskError::Timeout { kind, after } => PipelineError::Timeout {
                stage: TaskError::stage_name(kind),
                after_secs: after.as_secs(),
            },
            TaskError::WorkerLost {
                kind: TaskKind::RunSandboxedExecution,
                ..
            } => PipelineError::sandbox(None, err.to_string(), String::new()),
            TaskError::WorkerLost {
                kind: TaskKind::GenerateText,
                ..
            } => PipelineError::Upstream(err.to_string()),
            TaskError::WorkerLost { .. }
            | TaskError::NoHandler(_)
            | TaskError::UnexpectedOutput { .. }
            | TaskError::Closed => PipelineError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_pipeline_timeout() {
        let err: PipelineError = TaskError::Timeout {
            kind: TaskKind::GenerateText,
            after: Duration::from_secs(60),
        }
        .into();
        match err {
            PipelineError::Timeout { stage, after_secs } => {
                assert_eq!(stage, "text generation");
                assert_eq!(after_secs, 60);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn lost_sandbox_worker_is_a_sandbox_failure() {
        let err: PipelineError = TaskError::WorkerLost {
            kind: TaskKind::RunSandboxedExecution,
            deliveries: 3,
        }
        .into();
        match err {
            PipelineError::SandboxFailure { exit_code, reason, .. } => {
                assert_eq!(exit_code, None);
                assert!(reason.contains("after 3 deliveries"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn executor_faults_are_internal() {
        for err in [
            TaskError::Closed,
            TaskError::NoHandler(TaskKind::RunSandboxedExecution),
        ] {
            let err: PipelineError = err.into();
            assert_eq!(err.error_code().as_str(), "INTERNAL_ERROR");
        }
    }

    #[test]
    fn failed_unwraps_inner_error() {
        let err: PipelineError =
            TaskError::Failed(PipelineError::MalformedInput("empty".into())).into();
        assert!(matches!(err, PipelineError::MalformedInput(_)));
    }
}
