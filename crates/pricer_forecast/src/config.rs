//! Engine configuration.
//!
//! Every field has a default, so an empty TOML table is a valid
//! configuration:
//!
//! ```toml
//! volatility_pct = 20.0
//! horizon_days = 365
//! simulations = 10000
//! workers = 8
//! max_simulations = 5000000
//! max_workers = 8
//! run_interval_secs = 300
//! batch_size = 5000
//! data_dir = "data"
//! # batch_timeout_secs = 30
//! # seed = 42
//! ```

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::request::SimulationRequest;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default ceiling on simulations per run.
pub const DEFAULT_MAX_SIMULATIONS: usize = 5_000_000;

/// Lowest default for `max_workers`, whatever the CPU count.
const MIN_DEFAULT_MAX_WORKERS: usize = 8;

/// Engine configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric field is zero, negative or not finite.
    #[error("Invalid engine setting '{field}': {message}")]
    InvalidValue {
        /// Offending field.
        field: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// The configuration file could not be read or parsed.
    #[error("Configuration file error: {0}")]
    FileError(String),
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }
}

/// Settings consumed by [`ForecastEngine`](crate::ForecastEngine).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Total-horizon volatility in percent (20.0 for 20%).
    pub volatility_pct: f64,
    /// Forecast horizon in days.
    pub horizon_days: u32,
    /// Simulations per run.
    pub simulations: usize,
    /// Worker threads per run.
    pub workers: usize,
    /// Largest simulation count a request may ask for.
    pub max_simulations: usize,
    /// Size of the shared worker pool; no request may ask for more.
    pub max_workers: usize,
    /// Seconds between scheduled runs.
    pub run_interval_secs: u64,
    /// Paths per batch.
    pub batch_size: usize,
    /// Root directory of the run log.
    pub data_dir: PathBuf,
    /// Per-batch timeout; unset means no limit.
    pub batch_timeout_secs: Option<u64>,
    /// Base seed; unset draws a fresh one per run.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            volatility_pct: 20.0,
            horizon_days: 365,
            simulations: 10_000,
            workers: num_cpus::get(),
            max_simulations: DEFAULT_MAX_SIMULATIONS,
            max_workers: num_cpus::get().max(MIN_DEFAULT_MAX_WORKERS),
            run_interval_secs: 300,
            batch_size: DEFAULT_BATCH_SIZE,
            data_dir: PathBuf::from("data"),
            batch_timeout_secs: None,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Parses a TOML document and validates it.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::FileError(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileError(format!("Failed to read config file: {}", e)))?;
        Self::from_toml_str(&content)
    }

    /// Rejects non-positive values and defaults above their limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.volatility_pct.is_finite() && self.volatility_pct > 0.0) {
            return Err(ConfigError::invalid(
                "volatility_pct",
                format!("must be positive, got {}", self.volatility_pct),
            ));
        }
        let counts = [
            ("horizon_days", self.horizon_days as u64),
            ("simulations", self.simulations as u64),
            ("workers", self.workers as u64),
            ("max_simulations", self.max_simulations as u64),
            ("max_workers", self.max_workers as u64),
            ("run_interval_secs", self.run_interval_secs),
            ("batch_size", self.batch_size as u64),
        ];
        for (field, value) in counts {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be at least 1"));
            }
        }
        if self.simulations > self.max_simulations {
            return Err(ConfigError::invalid(
                "simulations",
                format!("must not exceed max_simulations ({})", self.max_simulations),
            ));
        }
        if self.workers > self.max_workers {
            return Err(ConfigError::invalid(
                "workers",
                format!("must not exceed max_workers ({})", self.max_workers),
            ));
        }
        if self.batch_timeout_secs == Some(0) {
            return Err(ConfigError::invalid("batch_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }

    /// Request used by scheduled runs and lazy first reads.
    pub fn default_request(&self) -> SimulationRequest {
        SimulationRequest::new(
            self.volatility_pct / 100.0,
            self.horizon_days,
            self.simulations,
            self.workers,
        )
    }

    /// Scheduler period.
    pub fn run_interval(&self) -> Duration {
        Duration::from_secs(self.run_interval_secs)
    }

    /// Per-batch timeout as a [`Duration`].
    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.horizon_days, 365);
        assert_eq!(config.batch_size, 5_000);
        assert!(config.workers >= 1);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("simulations = 2000\nseed = 7\n").unwrap();
        assert_eq!(config.simulations, 2_000);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.run_interval_secs, 300);
    }

    #[test]
    fn test_rejects_zero_values() {
        let err = EngineConfig::from_toml_str("batch_size = 0").unwrap_err();
        assert!(err.to_string().contains("batch_size"));

        let err = EngineConfig::from_toml_str("volatility_pct = -5.0").unwrap_err();
        assert!(err.to_string().contains("volatility_pct"));
    }

    #[test]
    fn test_defaults_within_limits() {
        let config = EngineConfig::default();
        assert!(config.workers <= config.max_workers);
        assert!(config.simulations <= config.max_simulations);
    }

    #[test]
    fn test_rejects_defaults_above_limits() {
        let err = EngineConfig::from_toml_str("workers = 6\nmax_workers = 4").unwrap_err();
        assert!(err.to_string().contains("max_workers (4)"));

        let err = EngineConfig::from_toml_str("simulations = 2000\nmax_simulations = 1000").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "simulations", .. }));
    }

    #[test]
    fn test_default_request_converts_percent() {
        let config = EngineConfig {
            volatility_pct: 35.0,
            workers: 3,
            ..EngineConfig::default()
        };
        let request = config.default_request();
        assert_relative_eq!(request.volatility, 0.35);
        assert_eq!(request.workers, 3);
        assert_eq!(request.start_price, None);
    }

    #[test]
    fn test_from_missing_file() {
        let err = EngineConfig::from_file("/nonexistent/engine.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileError(_)));
    }
}
