//! Sandboxed execution of a test plan inside a single-use, resource-capped
//! container.

mod executor;
mod handler;
mod job;
mod runtime;
mod summary;
mod types;

pub use executor::{SandboxExecutor, MINIMAL_PROPERTIES, PROPERTIES_FILE};
pub use handler::{container_name, SandboxHandler};
pub use job::{ExecutionJob, JobStatus, JobTransitionError};
pub use runtime::{ContainerRuntime, ContainerSession, ContainerSpec, Mount, CONTAINER_DATA_DIR};
pub use summary::{ExecutionSummary, NO_SUMMARY};
pub use types::{ResourceLimits, SandboxOutcome, SandboxRequest};
