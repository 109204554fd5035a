use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TaskError;
use crate::sandbox::{SandboxOutcome, SandboxRequest};

use super::schedule::MaintenanceReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    GenerateText,
    RunSandboxedExecution,
    ScheduledMaintenance,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GenerateText => "generate-text",
            Self::RunSandboxedExecution => "run-sandboxed-execution",
            Self::ScheduledMaintenance => "scheduled-maintenance",
        }
    }

    /// Long container runs get their own pool so they never starve model calls.
    pub fn queue(self) -> Queue {
        match self {
            Self::GenerateText => Queue::Text,
            Self::RunSandboxedExecution => Queue::Sandbox,
            Self::ScheduledMaintenance => Queue::Scheduler,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Queue {
    Text,
    Sandbox,
    Scheduler,
}

impl Queue {
    pub const ALL: [Queue; 3] = [Queue::Text, Queue::Sandbox, Queue::Scheduler];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Sandbox => "sandbox",
            Self::Scheduler => "scheduler",
        }
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TaskPayload {
    GenerateText { prompt: String },
    RunSandboxedExecution(SandboxRequest),
    ScheduledMaintenance,
}

impl TaskPayload {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::GenerateText { .. } => TaskKind::GenerateText,
            Self::RunSandboxedExecution(_) => TaskKind::RunSandboxedExecution,
            Self::ScheduledMaintenance => TaskKind::ScheduledMaintenance,
        }
    }

    /// Derived from the inputs, so a redelivered or resubmitted unit of work
    /// carries the same key.
    pub fn idempotency_key(&self) -> Uuid {
        let body = serde_json::to_vec(self).unwrap_or_default();
        let mut name = Vec::with_capacity(body.len() + 32);
        name.extend_from_slice(self.kind().as_str().as_bytes());
        name.push(b':');
        name.extend_from_slice(&body);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, &name)
    }
}

#[derive(Debug, Clone)]
pub enum TaskOutput {
    Text(String),
    Execution(SandboxOutcome),
    Maintenance(MaintenanceReport),
}

impl TaskOutput {
    pub fn into_text(self) -> Result<String, TaskError> {
        match self {
            Self::Text(text) => Ok(text),
            _ => Err(TaskError::UnexpectedOutput {
                kind: TaskKind::GenerateText,
            }),
        }
    }

    pub fn into_execution(self) -> Result<SandboxOutcome, TaskError> {
        match self {
            Self::Execution(outcome) => Ok(outcome),
            _ => Err(TaskError::UnexpectedOutput {
                kind: TaskKind::RunSandboxedExecution,
            }),
        }
    }

    pub fn into_maintenance(self) -> Result<MaintenanceReport, TaskError> {
        match self {
            Self::Maintenance(report) => Ok(report),
            _ => Err(TaskError::UnexpectedOutput {
                kind: TaskKind::ScheduledMaintenance,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    TimedOut,
    Errored,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Errored)
    }
}

/// Executor-side bookkeeping for one submitted task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub kind: TaskKind,
    pub state: TaskState,
    pub deliveries: u32,
    pub idempotency_key: Uuid,
    pub submitted_at: DateTime<Utc>,
}

impl TaskRecord {
    pub fn new(kind: TaskKind, idempotency_key: Uuid) -> Self {
        Self {
            kind,
            state: TaskState::Queued,
            deliveries: 0,
            idempotency_key,
            submitted_at: Utc::now(),
        }
    }
}
