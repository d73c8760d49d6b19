//! Error types for the forecasting engine.
//!
//! Every failure a run can produce falls into one of four kinds. Callers
//! match on [`ForecastError::kind`] rather than on message text.

use thiserror::Error;

/// Coarse classification of a [`ForecastError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForecastErrorKind {
    /// Input rejected before any work started.
    Validation,
    /// The reference price could not be obtained.
    SourceUnavailable,
    /// A batch could not complete.
    WorkerFailure,
    /// The run log or a raw output file could not be written or read.
    Persistence,
}

impl ForecastErrorKind {
    /// Stable snake_case name, used in logs and API bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::SourceUnavailable => "source_unavailable",
            Self::WorkerFailure => "worker_failure",
            Self::Persistence => "persistence",
        }
    }
}

impl std::fmt::Display for ForecastErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run-level error.
///
/// The type is `Clone` because one run outcome is fanned out to every
/// caller that joined the run while it was in flight.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ForecastError {
    /// Non-positive or otherwise invalid numeric input.
    #[error("Invalid parameter '{field}': {message}")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// No reference price could be obtained.
    #[error("Price source unavailable: {0}")]
    SourceUnavailable(String),

    /// A batch panicked, timed out or was lost.
    #[error("Batch {batch} failed: {message}")]
    WorkerFailure {
        /// Sequence number of the failed batch.
        batch: usize,
        /// Failure description.
        message: String,
    },

    /// Log or raw-output I/O failure.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl ForecastError {
    /// Create a validation error.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Create a source-unavailable error.
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable(message.into())
    }

    /// Create a worker failure for the given batch.
    pub fn worker(batch: usize, message: impl Into<String>) -> Self {
        Self::WorkerFailure {
            batch,
            message: message.into(),
        }
    }

    /// Create a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ForecastErrorKind {
        match self {
            Self::Validation { .. } => ForecastErrorKind::Validation,
            Self::SourceUnavailable(_) => ForecastErrorKind::SourceUnavailable,
            Self::WorkerFailure { .. } => ForecastErrorKind::WorkerFailure,
            Self::Persistence(_) => ForecastErrorKind::Persistence,
        }
    }
}

impl From<std::io::Error> for ForecastError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}
