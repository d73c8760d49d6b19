//! Health check endpoints
//!
//! Liveness and readiness checks for load balancer integration.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use pricer_forecast::RunStatus;
use serde::Serialize;

use super::AppState;

/// Health check response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Health status
    pub status: String,
    /// Gateway version
    pub version: String,
    /// Gateway uptime in seconds
    pub uptime_secs: u64,
    /// Engine run state
    pub run_status: RunStatus,
    /// Runs persisted so far
    pub run_count: u64,
}

/// Readiness response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyResponse {
    /// Ready status
    pub ready: bool,
    /// Whether an overview can be served without running a simulation
    pub overview_cached: bool,
}

/// Build the health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        run_status: state.engine.status(),
        run_count: state.engine.run_count(),
    };

    (StatusCode::OK, Json(response))
}

/// GET /ready
async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = ReadyResponse {
        ready: true,
        overview_cached: state.engine.cached_overview().is_some(),
    };
    (StatusCode::OK, Json(response))
}
