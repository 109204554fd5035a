use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SandboxConfig;

use super::summary::ExecutionSummary;

/// Per-run caps. Taken from configuration, never from the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Docker notation, e.g. `1g`.
    pub memory: String,
    pub cpu_shares: u32,
}

impl From<&SandboxConfig> for ResourceLimits {
    fn from(cfg: &SandboxConfig) -> Self {
        Self {
            memory: cfg.memory_limit.clone(),
            cpu_shares: cfg.cpu_shares,
        }
    }
}

/// A staged run: the plan already sits in `staging_dir`, the results file
/// does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxRequest {
    pub job_key: String,
    pub staging_dir: PathBuf,
    pub plan_file: String,
    pub results_file: String,
}

impl SandboxRequest {
    pub fn plan_path(&self) -> PathBuf {
        self.staging_dir.join(&self.plan_file)
    }

    pub fn results_path(&self) -> PathBuf {
        self.staging_dir.join(&self.results_file)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SandboxOutcome {
    pub exit_code: i64,
    pub summary: ExecutionSummary,
    /// False when the container exited cleanly but left no results behind.
    pub results_present: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}
