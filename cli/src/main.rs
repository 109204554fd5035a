use std::io::IsTerminal;

use clap::Parser;
use loadpilot_cli::commands::{cli, handlers};
use loadpilot_cli::http;
use loadpilot_core::api::{CliError, ErrorCode, LoggingConfig, Principal};
use loadpilot_core::config::{apply_env_overrides, load_default, load_from_path};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let cfg = match args.config.as_deref() {
        Some(path) => load_from_path(path)
            .map(|cfg| apply_env_overrides(cfg, |key| std::env::var(key).ok())),
        None => load_default(),
    }
    .map_err(|e| CliError::Config(e.to_string()))?;
    init_tracing(&cfg.logging).map_err(CliError::Command)?;

    let pipeline = loadpilot_plugins::factory::build_pipeline(&cfg)
        .map_err(|e| CliError::Config(e.to_string()))?;

    match args.command {
        cli::Commands::Serve(serve) => {
            http::handle_serve(serve, cfg, pipeline).await?;
            Ok(0)
        }
        cmd => {
            let principal = Principal::new(args.principal)?;
            handlers::dispatch(cmd, &pipeline, &principal).await
        }
    }
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 11: config error
    // 20: IO / command error
    // 30: generation exhausted or malformed input
    // 40: sandbox failure
    // 41: timeout
    // 50: upstream / store / uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Pipeline(pe) => match pe.error_code() {
            ErrorCode::InvalidRequest => 11,
            ErrorCode::Io => 20,
            ErrorCode::GenerationExhausted | ErrorCode::MalformedInput => 30,
            ErrorCode::SandboxFailure => 40,
            ErrorCode::Timeout => 41,
            ErrorCode::Upstream | ErrorCode::Store | ErrorCode::Internal => 50,
        },
        CliError::Io(_) => 20,
        CliError::Command(_) => 20,
        CliError::Anyhow(_) => 50,
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("loadpilot"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("loadpilot.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    // stdout carries the JSON result, so console logs always go to stderr.
    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
