use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use loadpilot_core::api::ArtifactKind;

#[derive(Parser, Debug)]
#[command(name = "loadpilot", version, about = "Generate, run and analyze JMeter load tests")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file. Defaults to ~/.loadpilot/config.toml, then ./config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Caller the artifacts belong to.
    #[arg(long, default_value = "local", global = true)]
    pub principal: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a test plan from a description and store it.
    Generate(GenerateArgs),
    /// Run a stored test plan in the sandbox.
    Run(FileArgs),
    /// Analyze stored raw results.
    Analyze(FileArgs),
    /// List stored artifacts of one kind.
    List(ListArgs),
    /// Print a time-limited download URL.
    Url(FileArgs),
    /// Generate, run and analyze in one go.
    Pipeline(PromptArgs),
    /// Serve the HTTP API.
    Serve(ServeArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PromptArgs {
    #[arg(long, group = "input")]
    pub prompt: Option<String>,

    #[arg(long, group = "input")]
    pub prompt_file: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub input: PromptArgs,

    /// Overrides `generation.max_attempts`.
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct FileArgs {
    pub filename: String,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Jmx,
    Jtl,
    Md,
}

impl From<KindArg> for ArtifactKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Jmx => ArtifactKind::TestPlan,
            KindArg::Jtl => ArtifactKind::RawResults,
            KindArg::Md => ArtifactKind::Report,
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ListArgs {
    #[arg(value_enum, default_value_t = KindArg::Jmx)]
    pub kind: KindArg,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    /// Overrides `http_server.host`.
    #[arg(long)]
    pub host: Option<String>,

    /// Overrides `http_server.port`.
    #[arg(long)]
    pub port: Option<u16>,
}
