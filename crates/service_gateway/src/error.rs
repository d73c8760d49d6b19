//! HTTP error responses.
//!
//! | Kind | Status |
//! |------|--------|
//! | `validation`, `bad_request` | 400 |
//! | `source_unavailable` | 503 |
//! | `worker_failure`, `persistence` | 500 |

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use pricer_forecast::{ForecastError, ForecastErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON error body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Machine-readable error kind
    pub error: String,
    /// Human-readable detail
    pub message: String,
}

/// Error returned by API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Engine error
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    /// Malformed request that never reached the engine
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forecast(e) => match e.kind() {
                ForecastErrorKind::Validation => StatusCode::BAD_REQUEST,
                ForecastErrorKind::SourceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                ForecastErrorKind::WorkerFailure | ForecastErrorKind::Persistence => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Forecast(e) => e.kind().as_str(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Request failed");
        }
        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
