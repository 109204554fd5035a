use std::net::SocketAddr;
use std::time::Duration;

use axum::middleware;
use loadpilot_core::api::{spawn_maintenance_schedule, AppConfig, CliError, Pipeline};
use tokio::signal;
use tracing::info;

use super::{
    middleware::{create_cors_layer, create_trace_layer, request_logger},
    routes::create_router,
    AppState,
};
use crate::commands::cli::ServeArgs;

/// Handle `loadpilot serve`. CLI flags win over `[http_server]`.
pub async fn handle_serve(
    args: ServeArgs,
    cfg: AppConfig,
    pipeline: Pipeline,
) -> Result<(), CliError> {
    let host = args.host.unwrap_or_else(|| cfg.http_server.host.clone());
    let port = args.port.unwrap_or(cfg.http_server.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| CliError::Config(format!("invalid listen address {host}:{port}: {e}")))?;

    let interval = Duration::from_secs(cfg.executor.maintenance_interval_secs.max(1));
    let schedule = spawn_maintenance_schedule(pipeline.executor().clone(), interval);

    let state = AppState::new(pipeline, cfg);

    let result = start_server(addr, state).await;
    schedule.abort();
    result
}

pub async fn start_server(addr: SocketAddr, state: AppState) -> Result<(), CliError> {
    let app = create_router(state.clone())
        .layer(middleware::from_fn(request_logger))
        .layer(create_cors_layer(state.config.http_server.cors_origin.as_deref()))
        .layer(create_trace_layer());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = signal::ctrl_c() => {
                    info!("Received Ctrl+C signal");
                }
                _ = wait_for_sigterm() => {
                    info!("Received SIGTERM signal");
                }
            }

            info!("Starting graceful shutdown...");
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}
