//! Feed configuration.

use crate::error::FeedError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One upstream endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedSpec {
    /// Name used in logs and errors.
    pub name: String,
    /// URL returning a JSON document.
    pub url: String,
    /// JSON pointer (RFC 6901) to the price, e.g. `/data/amount`.
    pub pointer: String,
}

impl FeedSpec {
    /// Creates a feed specification.
    pub fn new(name: impl Into<String>, url: impl Into<String>, pointer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            pointer: pointer.into(),
        }
    }
}

/// Settings for [`ReconciledPriceSource`](crate::ReconciledPriceSource).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedsConfig {
    /// Redundant feeds quoting the same pair.
    pub feeds: Vec<FeedSpec>,
    /// Per-feed request timeout.
    pub request_timeout_secs: u64,
    /// Quotes further than this from the median (in percent) are dropped.
    pub max_deviation_pct: f64,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            feeds: vec![
                FeedSpec::new(
                    "coinbase",
                    "https://api.coinbase.com/v2/prices/BTC-USD/spot",
                    "/data/amount",
                ),
                FeedSpec::new(
                    "kraken",
                    "https://api.kraken.com/0/public/Ticker?pair=XBTUSD",
                    "/result/XXBTZUSD/c/0",
                ),
                FeedSpec::new(
                    "bitstamp",
                    "https://www.bitstamp.net/api/v2/ticker/btcusd/",
                    "/last",
                ),
            ],
            request_timeout_secs: 5,
            max_deviation_pct: 2.0,
        }
    }
}

impl FeedsConfig {
    /// Rejects an empty feed list and non-positive limits.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.feeds.is_empty() {
            return Err(FeedError::Config("at least one feed is required".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(FeedError::Config("request_timeout_secs must be at least 1".into()));
        }
        if !(self.max_deviation_pct.is_finite() && self.max_deviation_pct > 0.0) {
            return Err(FeedError::Config(format!(
                "max_deviation_pct must be positive, got {}",
                self.max_deviation_pct
            )));
        }
        for feed in &self.feeds {
            if !feed.pointer.is_empty() && !feed.pointer.starts_with('/') {
                return Err(FeedError::Config(format!(
                    "pointer for '{}' must start with '/'",
                    feed.name
                )));
            }
        }
        Ok(())
    }

    /// Per-feed timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_three_feeds() {
        let config = FeedsConfig::default();
        assert_eq!(config.feeds.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides() {
        let config: FeedsConfig = toml::from_str(
            r#"
            max_deviation_pct = 1.5

            [[feeds]]
            name = "local"
            url = "http://127.0.0.1:9000/price"
            pointer = "/price"
            "#,
        )
        .unwrap();
        assert_eq!(config.feeds.len(), 1);
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.max_deviation_pct, 1.5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = FeedsConfig::default();
        config.feeds.clear();
        assert!(config.validate().is_err());

        let mut config = FeedsConfig::default();
        config.feeds[0].pointer = "data/amount".into();
        assert!(config.validate().is_err());

        let config = FeedsConfig {
            max_deviation_pct: 0.0,
            ..FeedsConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
