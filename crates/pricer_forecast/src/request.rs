//! Simulation request parameters and their validation.

use crate::error::ForecastError;
use serde::{Deserialize, Serialize};

/// Parameters of one simulation run.
///
/// `volatility` is the standard deviation of the log-return over the whole
/// horizon, as a decimal (0.20 for 20%). When `start_price` is `None` the
/// engine asks its price source for the reference price.
///
/// # Examples
///
/// ```rust
/// use pricer_forecast::SimulationRequest;
///
/// let request = SimulationRequest::new(0.20, 365, 10_000, 4).with_start_price(50_000.0);
/// assert!(request.validate().is_ok());
///
/// let invalid = SimulationRequest::new(0.0, 365, 10_000, 4);
/// assert!(invalid.validate().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    /// Total-horizon log-return standard deviation (decimal).
    pub volatility: f64,
    /// Horizon in days; also the number of daily shocks per path.
    pub horizon_days: u32,
    /// Number of independent paths to simulate.
    pub simulations: usize,
    /// Worker concurrency hint.
    pub workers: usize,
    /// Pinned starting price. Skips the price source when set.
    pub start_price: Option<f64>,
}

impl SimulationRequest {
    /// Creates a request that takes its starting price from the price source.
    pub fn new(volatility: f64, horizon_days: u32, simulations: usize, workers: usize) -> Self {
        Self {
            volatility,
            horizon_days,
            simulations,
            workers,
            start_price: None,
        }
    }

    /// Pins the starting price.
    pub fn with_start_price(mut self, start_price: f64) -> Self {
        self.start_price = Some(start_price);
        self
    }

    /// Checks that every numeric field is strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::Validation`] naming the first offending field.
    /// Values are never clamped.
    pub fn validate(&self) -> Result<(), ForecastError> {
        ensure_positive("volatility", self.volatility)?;
        if self.horizon_days == 0 {
            return Err(ForecastError::validation(
                "horizon_days",
                "must be at least 1",
            ));
        }
        if self.simulations == 0 {
            return Err(ForecastError::validation(
                "simulations",
                "must be at least 1",
            ));
        }
        if self.workers == 0 {
            return Err(ForecastError::validation("workers", "must be at least 1"));
        }
        if let Some(price) = self.start_price {
            ensure_positive("start_price", price)?;
        }
        Ok(())
    }

    /// Checks the simulation and worker counts against the engine's limits.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::Validation`] for a count above its limit.
    pub fn validate_limits(&self, max_simulations: usize, max_workers: usize) -> Result<(), ForecastError> {
        if self.simulations > max_simulations {
            return Err(ForecastError::validation(
                "simulations",
                format!("must not exceed {}, got {}", max_simulations, self.simulations),
            ));
        }
        if self.workers > max_workers {
            return Err(ForecastError::validation(
                "workers",
                format!("must not exceed {}, got {}", max_workers, self.workers),
            ));
        }
        Ok(())
    }
}

/// Rejects zero, negative, NaN and infinite values.
pub(crate) fn ensure_positive(field: &'static str, value: f64) -> Result<(), ForecastError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ForecastError::validation(
            field,
            format!("must be a positive finite number, got {}", value),
        ))
    }
}
