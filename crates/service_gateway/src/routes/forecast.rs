//! Forecast endpoints
//!
//! - `GET /api/v1/overview`: latest overview, running the first simulation on demand
//! - `POST /api/v1/simulations`: run now, optionally overriding the configured request
//! - `GET /api/v1/runs`: every persisted run
//! - `GET /api/v1/runs/lookup?ids=1,2,9`: per-id lookup

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use pricer_forecast::{OverviewReport, OverviewSnapshot, RunLookup, RunSummary, SimulationRequest};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::ApiError;

/// Optional overrides for `POST /api/v1/simulations`.
///
/// Absent fields fall back to the engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SimulationOverrides {
    /// Volatility in percent
    pub volatility_pct: Option<f64>,
    /// Horizon in days
    pub horizon_days: Option<u32>,
    /// Number of paths
    pub simulations: Option<usize>,
    /// Worker concurrency
    pub workers: Option<usize>,
    /// Pinned starting price
    pub start_price: Option<f64>,
}

impl SimulationOverrides {
    /// Applies the overrides on top of `base`.
    pub fn apply(&self, mut base: SimulationRequest) -> SimulationRequest {
        if let Some(pct) = self.volatility_pct {
            base.volatility = pct / 100.0;
        }
        if let Some(days) = self.horizon_days {
            base.horizon_days = days;
        }
        if let Some(simulations) = self.simulations {
            base.simulations = simulations;
        }
        if let Some(workers) = self.workers {
            base.workers = workers;
        }
        if let Some(price) = self.start_price {
            base.start_price = Some(price);
        }
        base
    }
}

/// One persisted run as served over HTTP
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunView {
    /// Run id, starting at 1
    pub run_id: u64,
    /// Completion time
    pub timestamp: DateTime<Utc>,
    /// Starting price
    pub reference_price: f64,
    /// Highest terminal price
    pub highest: f64,
    /// Mean plus one standard deviation
    pub target: f64,
    /// Mean terminal price
    pub average: f64,
    /// Lowest terminal price
    pub lowest: f64,
    /// Simulations in this run
    pub simulations: u64,
    /// Simulations across all runs so far
    pub total_simulations: u64,
    /// Processing time
    pub processing_ms: u64,
    /// Raw output file name
    pub raw_file: String,
}

impl From<RunSummary> for RunView {
    fn from(run: RunSummary) -> Self {
        Self {
            run_id: run.run_id,
            timestamp: run.timestamp,
            reference_price: run.reference_price,
            highest: run.highest,
            target: run.target,
            average: run.average,
            lowest: run.lowest,
            simulations: run.simulations,
            total_simulations: run.total_simulations,
            processing_ms: run.processing_ms,
            raw_file: run.raw_file,
        }
    }
}

/// Result of looking up one id
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LookupView {
    /// The run exists
    Found(RunView),
    /// No run with this id
    #[serde(rename_all = "camelCase")]
    NotAvailable {
        /// Requested id
        run_id: u64,
    },
}

impl From<RunLookup> for LookupView {
    fn from(lookup: RunLookup) -> Self {
        match lookup {
            RunLookup::Found(run) => LookupView::Found(run.into()),
            RunLookup::NotAvailable { run_id } => LookupView::NotAvailable { run_id },
        }
    }
}

/// Query string of the lookup endpoint
#[derive(Debug, Deserialize)]
pub struct LookupParams {
    /// Comma-separated run ids
    pub ids: String,
}

/// Build the forecast routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/overview", get(overview_handler))
        .route("/api/v1/simulations", post(simulation_handler))
        .route("/api/v1/runs", get(runs_handler))
        .route("/api/v1/runs/lookup", get(lookup_handler))
}

/// GET /api/v1/overview
async fn overview_handler(
    State(state): State<AppState>,
) -> Result<Json<OverviewReport>, ApiError> {
    Ok(Json(state.engine.overview().await?))
}

/// POST /api/v1/simulations
///
/// An empty body runs the configured request.
async fn simulation_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let overrides = if body.iter().all(u8::is_ascii_whitespace) {
        SimulationOverrides::default()
    } else {
        serde_json::from_slice::<SimulationOverrides>(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e)))?
    };
    let request = overrides.apply(state.engine.default_request());

    let snapshot = state.engine.run_simulation(request).await?;
    Ok((StatusCode::OK, Json(OverviewSnapshot::clone(&snapshot))))
}

/// GET /api/v1/runs
async fn runs_handler(State(state): State<AppState>) -> Result<Json<Vec<RunView>>, ApiError> {
    let runs = state.engine.list_runs().await?;
    Ok(Json(runs.into_iter().map(RunView::from).collect()))
}

/// GET /api/v1/runs/lookup
async fn lookup_handler(
    State(state): State<AppState>,
    Query(params): Query<LookupParams>,
) -> Result<Json<Vec<LookupView>>, ApiError> {
    let ids = parse_ids(&params.ids)?;
    let lookups = state.engine.runs_by_ids(ids).await?;
    Ok(Json(lookups.into_iter().map(LookupView::from).collect()))
}

/// Parses `1, 2,9` into ids, keeping order and duplicates.
fn parse_ids(raw: &str) -> Result<Vec<u64>, ApiError> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| ApiError::BadRequest(format!("invalid run id: {:?}", s)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if ids.is_empty() {
        return Err(ApiError::BadRequest("ids must name at least one run".to_string()));
    }
    Ok(ids)
}
