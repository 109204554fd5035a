use std::process::{Output, Stdio};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use loadpilot_core::api::{ContainerRuntime, ContainerSession, ContainerSpec};
use tokio::process::Command;

/// Drives the docker CLI. One detached container per run.
pub struct DockerRuntime {
    bin: String,
}

impl DockerRuntime {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new("docker")
    }
}

/// Arguments for `docker run`, excluding the binary. Host paths are made
/// absolute; docker reads a relative one as a named volume.
pub fn run_args(spec: &ContainerSpec) -> Result<Vec<String>> {
    let mut args = vec![
        "run".to_string(),
        "--detach".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "--memory".to_string(),
        spec.limits.memory.clone(),
        "--cpu-shares".to_string(),
        spec.limits.cpu_shares.to_string(),
    ];
    for mount in &spec.mounts {
        let mode = if mount.read_only { "ro" } else { "rw" };
        args.push("--volume".to_string());
        let host = std::path::absolute(&mount.host)
            .with_context(|| format!("cannot resolve mount {}", mount.host.display()))?;
        args.push(format!("{}:{}:{mode}", host.display(), mount.container));
    }
    args.push(spec.image.clone());
    args.extend(spec.args.iter().cloned());
    Ok(args)
}

async fn docker(bin: &str, args: &[&str]) -> Result<Output> {
    Command::new(bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .with_context(|| format!("failed to spawn {bin}"))
}

fn check(output: Output, what: &str) -> Result<String> {
    if !output.status.success() {
        bail!(
            "{what} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    fn name(&self) -> &str {
        "docker"
    }

    async fn remove_stale(&self, name: &str) -> Result<()> {
        let output = docker(&self.bin, &["rm", "--force", name]).await?;
        if output.status.success() {
            tracing::warn!(container = %name, "removed leftover container from an earlier delivery");
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("No such container") {
            return Ok(());
        }
        bail!("docker rm {name} failed: {}", stderr.trim())
    }

    async fn start(&self, spec: &ContainerSpec) -> Result<Box<dyn ContainerSession>> {
        let args = run_args(spec)?;
        tracing::debug!(container = %spec.name, args = ?args, "docker run");
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let id = check(docker(&self.bin, &arg_refs).await?, "docker run")?;
        if id.is_empty() {
            bail!("docker run printed no container id");
        }
        Ok(Box::new(DockerSession {
            bin: self.bin.clone(),
            id,
        }))
    }
}

struct DockerSession {
    bin: String,
    id: String,
}

#[async_trait]
impl ContainerSession for DockerSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn wait(&mut self) -> Result<i64> {
        let out = check(docker(&self.bin, &["wait", &self.id]).await?, "docker wait")?;
        out.lines()
            .last()
            .unwrap_or_default()
            .trim()
            .parse()
            .with_context(|| format!("unexpected docker wait output: {out}"))
    }

    async fn logs(&mut self) -> Result<String> {
        let output = docker(&self.bin, &["logs", &self.id]).await?;
        if !output.status.success() {
            bail!(
                "docker logs failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        // Container stderr arrives on our stderr.
        let mut console = String::from_utf8_lossy(&output.stdout).into_owned();
        console.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(console)
    }

    async fn remove(&mut self) -> Result<()> {
        check(
            docker(&self.bin, &["rm", "--force", &self.id]).await?,
            "docker rm",
        )
        .map(|_| ())
    }
}
