#[allow(clippy::module_inception)]
pub mod error;
pub mod pipeline;
pub mod task;

pub use error::CliError;
pub use pipeline::{ErrorCode, PipelineError, StoreError};
pub use task::TaskError;
