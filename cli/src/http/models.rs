//! Request/response bodies and the error envelope.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use loadpilot_core::api::{ArtifactKind, PipelineError, Principal, StoreError};
use serde::{Deserialize, Serialize};

pub const PRINCIPAL_HEADER: &str = "x-principal";

// ============= Requests =============

#[derive(Debug, Deserialize)]
pub struct GenerateTestPlanRequest {
    pub prompt: String,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct ListFilesQuery {
    #[serde(rename = "type", default = "default_list_type")]
    pub kind: String,
}

fn default_list_type() -> String {
    ArtifactKind::TestPlan.extension().to_string()
}

impl ListFilesQuery {
    pub fn artifact_kind(&self) -> Result<ArtifactKind, HttpServerError> {
        ArtifactKind::from_extension(self.kind.trim()).ok_or_else(|| {
            HttpServerError::InvalidRequest(format!(
                "unknown file type '{}', expected jmx, jtl or md",
                self.kind
            ))
        })
    }
}

// ============= Responses =============

/// Success envelope: `{"status":"success", ...payload}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            status: "success",
            data,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ListFilesResponse {
    pub files: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: f64,
    pub requests_handled: u64,
    pub errors_total: u64,
    pub timestamp: String,
}

// ============= Caller identity =============

/// Principal taken from the `X-Principal` header.
pub struct CallerPrincipal(pub Principal);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerPrincipal {
    type Rejection = HttpServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(PRINCIPAL_HEADER)
            .ok_or_else(|| HttpServerError::InvalidRequest("missing X-Principal header".into()))?
            .to_str()
            .map_err(|_| HttpServerError::InvalidRequest("X-Principal is not valid text".into()))?;
        Ok(Self(Principal::new(raw)?))
    }
}

// ============= Error Handling =============

#[derive(Debug)]
pub enum HttpServerError {
    InvalidRequest(String),
    Pipeline(PipelineError),
    Internal(String),
}

impl From<PipelineError> for HttpServerError {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}

pub fn status_for(e: &PipelineError) -> StatusCode {
    match e {
        PipelineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        PipelineError::GenerationExhausted { .. } | PipelineError::MalformedInput(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PipelineError::Upstream(_) | PipelineError::SandboxFailure { .. } => {
            StatusCode::BAD_GATEWAY
        }
        PipelineError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        PipelineError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
        PipelineError::Store(StoreError::InvalidKey(_)) => StatusCode::BAD_REQUEST,
        PipelineError::Store(_) | PipelineError::Io(_) | PipelineError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({ "status": "error" });
        let status = match self {
            Self::InvalidRequest(msg) => {
                body["message"] = msg.into();
                body["error_code"] = "INVALID_REQUEST".into();
                StatusCode::BAD_REQUEST
            }
            Self::Internal(msg) => {
                body["message"] = msg.into();
                body["error_code"] = "INTERNAL_ERROR".into();
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Pipeline(e) => {
                body["message"] = e.to_string().into();
                body["error_code"] = e.error_code().as_str().into();
                if let Some(attempts) = e.attempts() {
                    body["attempts"] = attempts.into();
                }
                if let PipelineError::SandboxFailure { console, .. } = &e {
                    body["console"] = console.as_str().into();
                }
                status_for(&e)
            }
        };

        (status, Json(body)).into_response()
    }
}
