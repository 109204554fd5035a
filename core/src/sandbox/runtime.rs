use std::path::PathBuf;

use async_trait::async_trait;

use super::types::ResourceLimits;

/// Where staged files appear inside the container.
pub const CONTAINER_DATA_DIR: &str = "/data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub container: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub args: Vec<String>,
    pub mounts: Vec<Mount>,
    pub limits: ResourceLimits,
}

/// Creates single-use containers.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    fn name(&self) -> &str;

    /// Remove a leftover container with this name from an earlier delivery
    /// of the same task.
    async fn remove_stale(&self, _name: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn start(&self, spec: &ContainerSpec) -> anyhow::Result<Box<dyn ContainerSession>>;
}

/// A started container. `remove` must be safe to call whatever state the
/// container is in.
#[async_trait]
pub trait ContainerSession: Send {
    fn id(&self) -> &str;

    /// Block until the container exits and return its exit code.
    async fn wait(&mut self) -> anyhow::Result<i64>;

    /// Full console output (stdout and stderr).
    async fn logs(&mut self) -> anyhow::Result<String>;

    async fn remove(&mut self) -> anyhow::Result<()>;
}
