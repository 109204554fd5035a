//! Background task dispatch.
//!
//! Every expensive unit of work (model calls, sandboxed runs, hourly
//! maintenance) goes through [`TaskExecutor`]:
//!
//! ```text
//! submit(payload) ──► queue (text | sandbox | scheduler)
//!                        │  Semaphore-bounded worker pool
//!                        ▼
//!                   TaskHandler::handle ──► oneshot ──► TaskHandle::wait(timeout)
//! ```
//!
//! Delivery is at-least-once: a worker that dies mid-task causes a
//! redelivery, so handlers must tolerate running twice for the same
//! idempotency key. A `wait` that times out does not cancel the task.

mod executor;
mod handle;
mod schedule;
mod traits;
mod types;

pub use executor::{TaskExecutor, TaskExecutorBuilder};
pub use handle::TaskHandle;
pub use schedule::{
    delay_until_next_tick, spawn_maintenance_schedule, MaintenanceHandler, MaintenanceJob,
    MaintenanceReport,
};
pub use traits::{TaskContext, TaskHandler};
pub(crate) use traits::unexpected_payload;
pub use types::{Queue, TaskKind, TaskOutput, TaskPayload, TaskRecord, TaskState};
