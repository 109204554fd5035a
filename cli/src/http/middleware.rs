use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::Next,
    response::Response,
};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use super::models::PRINCIPAL_HEADER;

/// CORS for the configured origin, or localhost only when none is set.
///
/// No request timeout layer: sandboxed runs are bounded by the sandbox
/// deadline instead.
pub fn create_cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| HeaderValue::from_str(s).ok())
    {
        Some(origin) => AllowOrigin::exact(origin),
        None => AllowOrigin::predicate(|origin: &HeaderValue, _| is_local_origin(origin)),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(PRINCIPAL_HEADER),
        ])
        .max_age(Duration::from_secs(3600))
}

fn is_local_origin(origin: &HeaderValue) -> bool {
    origin
        .to_str()
        .map(|s| {
            s.starts_with("http://localhost")
                || s.starts_with("https://localhost")
                || s.starts_with("http://127.0.0.1")
                || s.starts_with("https://127.0.0.1")
        })
        .unwrap_or(false)
}

pub fn create_trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}

pub async fn request_logger(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        warn!(
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request failed"
        );
    } else {
        info!(
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_origins_only() {
        assert!(is_local_origin(&HeaderValue::from_static("http://localhost:3000")));
        assert!(is_local_origin(&HeaderValue::from_static("https://127.0.0.1")));
        assert!(!is_local_origin(&HeaderValue::from_static("https://example.com")));
    }
}
