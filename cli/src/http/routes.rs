use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use loadpilot_core::api::{AnalysisReport, GeneratedPlan, PipelineError, TestRun};

use crate::http::{models::*, state::AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/generate-test-plan", post(generate_test_plan_handler))
        .route("/run-test/:filename", post(run_test_handler))
        .route("/analyze", post(analyze_handler))
        .route("/list-files", get(list_files_handler))
        .route("/download/:filename", get(download_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

fn track<T>(state: &AppState, result: Result<T, PipelineError>) -> Result<T, HttpServerError> {
    result.map_err(|e| {
        state.stats.increment_error();
        tracing::error!(error_code = e.error_code().as_str(), error = %e, "request failed");
        HttpServerError::from(e)
    })
}

/// POST /generate-test-plan - generate and store a validated test plan.
/// A client `max_attempts` can lower the configured bound, never raise it.
async fn generate_test_plan_handler(
    State(state): State<AppState>,
    CallerPrincipal(principal): CallerPrincipal,
    Json(req): Json<GenerateTestPlanRequest>,
) -> Result<Json<ApiResponse<GeneratedPlan>>, HttpServerError> {
    state.stats.increment_request("/generate-test-plan");

    let result = match req.max_attempts {
        Some(n) => {
            let n = n.min(state.config.generation.max_attempts);
            state
                .pipeline
                .generate_plan_with_attempts(&principal, &req.prompt, n)
                .await
        }
        None => state.pipeline.generate_plan(&principal, &req.prompt).await,
    };
    Ok(ApiResponse::success(track(&state, result)?))
}

/// POST /run-test/:filename - run a stored plan in the sandbox
async fn run_test_handler(
    State(state): State<AppState>,
    CallerPrincipal(principal): CallerPrincipal,
    Path(filename): Path<String>,
) -> Result<Json<ApiResponse<TestRun>>, HttpServerError> {
    state.stats.increment_request("/run-test");

    let result = state.pipeline.run_test(&principal, &filename).await;
    Ok(ApiResponse::success(track(&state, result)?))
}

/// POST /analyze - aggregate stored results and write a report
async fn analyze_handler(
    State(state): State<AppState>,
    CallerPrincipal(principal): CallerPrincipal,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<ApiResponse<AnalysisReport>>, HttpServerError> {
    state.stats.increment_request("/analyze");

    let result = state.pipeline.analyze_results(&principal, &req.filename).await;
    Ok(ApiResponse::success(track(&state, result)?))
}

/// GET /list-files?type=jmx|jtl|md - list the caller's artifacts
async fn list_files_handler(
    State(state): State<AppState>,
    CallerPrincipal(principal): CallerPrincipal,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<ApiResponse<ListFilesResponse>>, HttpServerError> {
    state.stats.increment_request("/list-files");

    let kind = query.artifact_kind()?;
    let result = state.pipeline.list_artifacts(&principal, kind).await;
    let files = track(&state, result)?;
    Ok(ApiResponse::success(ListFilesResponse { files }))
}

/// GET /download/:filename - time-limited download link
async fn download_handler(
    State(state): State<AppState>,
    CallerPrincipal(principal): CallerPrincipal,
    Path(filename): Path<String>,
) -> Result<Json<ApiResponse<DownloadResponse>>, HttpServerError> {
    state.stats.increment_request("/download");

    let result = state.pipeline.download_url(&principal, &filename).await;
    let url = track(&state, result)?;
    Ok(ApiResponse::success(DownloadResponse { url }))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    state.stats.increment_request("/health");

    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.stats.uptime_seconds(),
        requests_handled: state.stats.requests_total(),
        errors_total: state.stats.errors_total(),
        timestamp: Local::now().to_rfc3339(),
    })
}
