//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `loadpilot_core::api` instead of reaching into internal modules.

pub use crate::analysis::{AggregatedMetrics, AnalysisReport, ResultAnalyzer};
pub use crate::config::{
    load_default, load_from_path, AppConfig, ExecutorConfig, GeminiConfig, HttpServerConfig,
    LoggingConfig, ModelConfig, SandboxConfig, StoreConfig,
};
pub use crate::error::{CliError, ErrorCode, PipelineError, StoreError, TaskError};
pub use crate::model::{ModelClient, ModelError, TextGenerationHandler};
pub use crate::pipeline::{EndToEndReport, Pipeline, TestRun};
pub use crate::plan::{GeneratedPlan, PlanGenerator, TestPlanArtifact};
pub use crate::sandbox::{
    ContainerRuntime, ContainerSession, ContainerSpec, ExecutionJob, JobStatus, Mount,
    SandboxExecutor, SandboxHandler, SandboxOutcome,
};
pub use crate::store::{ArtifactKind, MemoryObjectStore, ObjectStore, Principal};
pub use crate::task::{
    spawn_maintenance_schedule, MaintenanceHandler, MaintenanceJob, MaintenanceReport,
    TaskExecutor, TaskKind, TaskState,
};
