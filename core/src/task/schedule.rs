use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::error::{PipelineError, TaskError};

use super::executor::TaskExecutor;
use super::traits::{unexpected_payload, TaskContext, TaskHandler};
use super::types::{TaskOutput, TaskPayload};

#[derive(Debug, Clone, Default, Serialize)]
pub struct MaintenanceReport {
    pub job: String,
    pub removed: usize,
    pub message: Option<String>,
}

/// Periodic housekeeping that runs on the scheduler queue, outside any
/// request path.
#[async_trait]
pub trait MaintenanceJob: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self) -> anyhow::Result<MaintenanceReport>;
}

pub struct MaintenanceHandler {
    job: Arc<dyn MaintenanceJob>,
}

impl MaintenanceHandler {
    pub fn new(job: Arc<dyn MaintenanceJob>) -> Self {
        Self { job }
    }
}

#[async_trait]
impl TaskHandler for MaintenanceHandler {
    fn name(&self) -> &str {
        "maintenance"
    }

    async fn handle(
        &self,
        payload: TaskPayload,
        _ctx: TaskContext,
    ) -> Result<TaskOutput, PipelineError> {
        if !matches!(payload, TaskPayload::ScheduledMaintenance) {
            return Err(unexpected_payload(self.name(), &payload));
        }
        let report = self.job.run().await.map_err(|e| {
            PipelineError::Io(std::io::Error::other(format!(
                "{} failed: {e}",
                self.job.name()
            )))
        })?;
        Ok(TaskOutput::Maintenance(report))
    }
}

/// Time until the next wall-clock multiple of `interval` (UTC). With the
/// default one-hour interval this is the top of the next hour.
pub fn delay_until_next_tick(now: DateTime<Utc>, interval: Duration) -> Duration {
    let interval_ms = (interval.as_millis() as i64).max(1);
    let now_ms = now.timestamp_millis();
    let next_ms = (now_ms.div_euclid(interval_ms) + 1) * interval_ms;
    Duration::from_millis((next_ms - now_ms) as u64)
}

/// Submit a maintenance task on every tick until the executor closes.
pub fn spawn_maintenance_schedule(executor: TaskExecutor, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "maintenance schedule started");
        loop {
            tokio::time::sleep(delay_until_next_tick(Utc::now(), interval)).await;

            let handle = match executor.submit(TaskPayload::ScheduledMaintenance) {
                Ok(handle) => handle,
                Err(TaskError::Closed) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "maintenance submit failed");
                    continue;
                }
            };

            // Waiting off the loop keeps the cadence fixed even when a run is slow.
            tokio::spawn(async move {
                match handle.wait(interval).await.and_then(TaskOutput::into_maintenance) {
                    Ok(report) => tracing::info!(
                        job = %report.job,
                        removed = report.removed,
                        "maintenance finished"
                    ),
                    Err(e) => tracing::warn!(error = %e, "maintenance did not finish"),
                }
            });
        }
        tracing::info!("maintenance schedule stopped");
    })
}
