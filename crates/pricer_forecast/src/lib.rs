//! # Pricer Forecast (P: Simulation Engine)
//!
//! Batched Monte Carlo forecasting of a single asset price, with an
//! append-only run history.
//!
//! ## Components
//!
//! - [`sampler`]: multiplicative daily-shock random walk whose terminal
//!   log-return dispersion equals the requested volatility for any horizon
//! - [`pool`]: bounded Rayon worker pool executing one batch per job
//! - [`batch`]: batch partitioning and sequence-ordered merging
//! - [`stats`]: lowest/highest/average/target and percentage changes
//! - [`store`]: summary ledger plus one raw output file per run
//! - [`cache`]: single-slot latest overview
//! - [`engine`]: the orchestrator tying the above together, single-flight
//! - [`scheduler`]: periodic run trigger
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use pricer_forecast::{EngineConfig, FixedPriceSource, ForecastEngine};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), pricer_forecast::ForecastError> {
//! let engine = ForecastEngine::open(
//!     EngineConfig::default(),
//!     Arc::new(FixedPriceSource::new(50_000.0)),
//! )?;
//!
//! let snapshot = engine.run_simulation(engine.default_request()).await?;
//! println!("target {:.2}", snapshot.overview.target.value);
//!
//! for run in engine.list_runs().await? {
//!     println!("#{} average {:.2}", run.run_id, run.average);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod batch;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod pool;
pub mod request;
pub mod rng;
pub mod sampler;
pub mod scheduler;
pub mod source;
pub mod stats;
pub mod store;

pub use cache::{OverviewCache, OverviewSnapshot, RunDetails};
pub use config::EngineConfig;
pub use engine::{ForecastEngine, OverviewReport, RunOutcome, RunStatus};
pub use error::{ForecastError, ForecastErrorKind};
pub use request::SimulationRequest;
pub use scheduler::spawn_scheduler;
pub use source::{FixedPriceSource, PriceSource};
pub use stats::{Overview, PricePoint, RunStatistics};
pub use store::{RunLookup, RunSummary};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
