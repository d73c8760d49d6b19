//! # Adapter Feeds (A: Price Input)
//!
//! Concrete [`PriceSource`](pricer_forecast::PriceSource) for the forecast
//! engine: several public spot-price endpoints quoting the same pair,
//! queried concurrently and reconciled into one reference price.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use adapter_feeds::{FeedsConfig, ReconciledPriceSource};
//! use pricer_forecast::PriceSource;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = ReconciledPriceSource::from_config(&FeedsConfig::default())?;
//! let price = source.current_price().await?;
//! println!("reference price {:.2}", price);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod http;
pub mod reconcile;

pub use config::{FeedSpec, FeedsConfig};
pub use error::FeedError;
pub use http::{parse_price, HttpPriceFeed, PriceFeed};
pub use reconcile::{reconcile, Reconciled, ReconciledPriceSource};
