//! Route modules for the forecast gateway
//!
//! - health: health check and readiness
//! - forecast: overview, simulation runs and run history

pub mod forecast;
pub mod health;

use axum::Router;
use pricer_forecast::ForecastEngine;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration
    pub config: Arc<ServerConfig>,
    /// Simulation engine
    pub engine: ForecastEngine,
    /// Server start time for uptime calculation
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create a new AppState
    pub fn new(config: Arc<ServerConfig>, engine: ForecastEngine) -> Self {
        Self {
            config,
            engine,
            start_time: std::time::Instant::now(),
        }
    }
}

/// Build the main application router by merging all route modules
pub fn build_router(config: Arc<ServerConfig>, engine: ForecastEngine) -> Router {
    let state = AppState::new(config, engine);

    Router::new()
        .merge(health::routes())
        .merge(forecast::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
