use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use loadpilot_core::api::{AppConfig, Pipeline};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<AppConfig>,
    pub stats: Arc<ServerStats>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, config: AppConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
            stats: Arc::new(ServerStats::new()),
        }
    }
}

pub struct ServerStats {
    requests_total: AtomicU64,
    errors_total: AtomicU64,
    requests_by_endpoint: Mutex<HashMap<&'static str, u64>>,
    start_time: DateTime<Local>,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            requests_by_endpoint: Mutex::new(HashMap::new()),
            start_time: Local::now(),
        }
    }

    pub fn increment_request(&self, endpoint: &'static str) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut by_endpoint) = self.requests_by_endpoint.lock() {
            *by_endpoint.entry(endpoint).or_insert(0) += 1;
        }
    }

    pub fn increment_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn errors_total(&self) -> u64 {
        self.errors_total.load(Ordering::Relaxed)
    }

    pub fn requests_for(&self, endpoint: &str) -> u64 {
        self.requests_by_endpoint
            .lock()
            .ok()
            .and_then(|m| m.get(endpoint).copied())
            .unwrap_or(0)
    }

    pub fn uptime_seconds(&self) -> f64 {
        (Local::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}
