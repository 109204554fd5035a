use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::types::ResourceLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("execution job cannot move from {from} to {to}")]
pub struct JobTransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One sandboxed run, from submission to a terminal status.
///
/// Moves `pending → running → succeeded|failed` exactly once and is frozen
/// afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionJob {
    pub job_key: String,
    pub input_artifact_key: String,
    pub resource_limits: ResourceLimits,
    status: JobStatus,
    raw_result_key: Option<String>,
    summary: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl ExecutionJob {
    pub fn new(
        job_key: impl Into<String>,
        input_artifact_key: impl Into<String>,
        resource_limits: ResourceLimits,
    ) -> Self {
        Self {
            job_key: job_key.into(),
            input_artifact_key: input_artifact_key.into(),
            resource_limits,
            status: JobStatus::Pending,
            raw_result_key: None,
            summary: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn raw_result_key(&self) -> Option<&str> {
        self.raw_result_key.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }

    fn transition(&mut self, to: JobStatus) -> Result<(), JobTransitionError> {
        let allowed = matches!(
            (self.status, to),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed)
        );
        if !allowed {
            return Err(JobTransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn start(&mut self, at: DateTime<Utc>) -> Result<(), JobTransitionError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(at);
        Ok(())
    }

    pub fn succeed(
        &mut self,
        raw_result_key: Option<String>,
        summary: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<(), JobTransitionError> {
        self.transition(JobStatus::Succeeded)?;
        self.raw_result_key = raw_result_key;
        self.summary = Some(summary.into());
        self.finished_at = Some(at);
        Ok(())
    }

    pub fn fail(
        &mut self,
        summary: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<(), JobTransitionError> {
        self.transition(JobStatus::Failed)?;
        self.summary = Some(summary.into());
        self.finished_at = Some(at);
        Ok(())
    }
}
