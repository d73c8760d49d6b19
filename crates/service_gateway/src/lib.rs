//! REST gateway for the price forecast engine
//!
//! Exposes [`pricer_forecast::ForecastEngine`] over HTTP: the cached overview,
//! on-demand runs and the run history. Process configuration, tracing
//! initialisation and graceful shutdown also live here; the binary in
//! `main.rs` wires them together with the reconciled exchange feeds from
//! [`adapter_feeds`].

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod routes;
pub mod server;

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
