//! Reconciliation of redundant feeds into one reference price.
//!
//! All feeds are queried concurrently. Failed feeds are skipped; the
//! surviving quotes are filtered around their median and averaged:
//!
//! ```text
//! median = median(quotes)
//! kept   = { q : |q - median| / median * 100 <= max_deviation_pct }
//! price  = mean(kept)
//! ```

use crate::config::FeedsConfig;
use crate::error::FeedError;
use crate::http::{HttpPriceFeed, PriceFeed};
use async_trait::async_trait;
use pricer_forecast::{ForecastError, PriceSource};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Outcome of reconciling a set of quotes.
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciled {
    /// Reconciled price.
    pub price: f64,
    /// Median of all quotes.
    pub median: f64,
    /// Quotes that entered the mean.
    pub kept: Vec<f64>,
    /// Quotes discarded as outliers.
    pub rejected: Vec<f64>,
}

/// Median-filtered mean of `quotes`, or `None` if there are none.
///
/// When every quote is an outlier (two quotes far apart), the median itself
/// is returned.
pub fn reconcile(quotes: &[f64], max_deviation_pct: f64) -> Option<Reconciled> {
    if quotes.is_empty() {
        return None;
    }

    let mut sorted = quotes.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    let (kept, rejected): (Vec<f64>, Vec<f64>) = quotes
        .iter()
        .partition(|&&q| ((q - median) / median * 100.0).abs() <= max_deviation_pct);

    let price = if kept.is_empty() {
        median
    } else {
        kept.iter().sum::<f64>() / kept.len() as f64
    };

    Some(Reconciled {
        price,
        median,
        kept,
        rejected,
    })
}

/// [`PriceSource`] backed by several redundant feeds.
pub struct ReconciledPriceSource {
    feeds: Vec<Arc<dyn PriceFeed>>,
    max_deviation_pct: f64,
}

impl std::fmt::Debug for ReconciledPriceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.feeds.iter().map(|feed| feed.name()).collect();
        f.debug_struct("ReconciledPriceSource")
            .field("feeds", &names)
            .field("max_deviation_pct", &self.max_deviation_pct)
            .finish()
    }
}

impl ReconciledPriceSource {
    /// Creates a source over arbitrary feeds.
    pub fn new(feeds: Vec<Arc<dyn PriceFeed>>, max_deviation_pct: f64) -> Self {
        Self {
            feeds,
            max_deviation_pct,
        }
    }

    /// Builds HTTP feeds from configuration.
    pub fn from_config(config: &FeedsConfig) -> Result<Self, FeedError> {
        config.validate()?;
        let feeds = config
            .feeds
            .iter()
            .map(|spec| {
                HttpPriceFeed::new(spec.clone(), config.request_timeout())
                    .map(|feed| Arc::new(feed) as Arc<dyn PriceFeed>)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(feeds, config.max_deviation_pct))
    }

    /// Number of configured feeds.
    pub fn feed_count(&self) -> usize {
        self.feeds.len()
    }

    /// Queries every feed concurrently and reconciles the answers.
    pub async fn fetch_reconciled(&self) -> Result<Reconciled, ForecastError> {
        let mut requests = JoinSet::new();
        for feed in &self.feeds {
            let feed = Arc::clone(feed);
            requests.spawn(async move {
                let result = feed.fetch().await;
                (feed.name().to_string(), result)
            });
        }

        let mut quotes = Vec::with_capacity(self.feeds.len());
        let mut failures = Vec::new();
        while let Some(joined) = requests.join_next().await {
            match joined {
                Ok((name, Ok(price))) => {
                    debug!(feed = %name, price, "Feed quote received");
                    quotes.push(price);
                }
                Ok((name, Err(e))) => {
                    warn!(feed = %name, error = %e, "Price feed failed");
                    failures.push(format!("{}: {}", name, e));
                }
                Err(e) => {
                    warn!(error = %e, "Price feed task failed");
                    failures.push(e.to_string());
                }
            }
        }

        let reconciled = reconcile(&quotes, self.max_deviation_pct).ok_or_else(|| {
            ForecastError::source_unavailable(if failures.is_empty() {
                "no price feeds configured".to_string()
            } else {
                failures.join("; ")
            })
        })?;

        if !reconciled.rejected.is_empty() {
            warn!(
                median = reconciled.median,
                rejected = ?reconciled.rejected,
                max_deviation_pct = self.max_deviation_pct,
                "Discarded outlier quotes"
            );
        }
        Ok(reconciled)
    }
}

#[async_trait]
impl PriceSource for ReconciledPriceSource {
    async fn current_price(&self) -> Result<f64, ForecastError> {
        self.fetch_reconciled().await.map(|r| r.price)
    }

    fn name(&self) -> &str {
        "reconciled_feeds"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pricer_forecast::ForecastErrorKind;

    struct StaticFeed {
        name: &'static str,
        price: Option<f64>,
    }

    #[async_trait]
    impl PriceFeed for StaticFeed {
        async fn fetch(&self) -> Result<f64, FeedError> {
            self.price
                .ok_or_else(|| FeedError::InvalidPrice("feed down".to_string()))
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn source(prices: &[Option<f64>]) -> ReconciledPriceSource {
        let names = ["a", "b", "c", "d", "e"];
        let feeds = prices
            .iter()
            .zip(names)
            .map(|(&price, name)| Arc::new(StaticFeed { name, price }) as Arc<dyn PriceFeed>)
            .collect();
        ReconciledPriceSource::new(feeds, 2.0)
    }

    #[test]
    fn test_reconcile_drops_outlier() {
        let r = reconcile(&[100.0, 101.0, 150.0], 2.0).unwrap();
        assert_eq!(r.median, 101.0);
        assert_eq!(r.rejected, vec![150.0]);
        assert_relative_eq!(r.price, 100.5);
    }

    #[test]
    fn test_reconcile_even_count_median() {
        let r = reconcile(&[100.0, 102.0], 2.0).unwrap();
        assert_eq!(r.median, 101.0);
        assert_relative_eq!(r.price, 101.0);
    }

    #[test]
    fn test_reconcile_all_outliers_falls_back_to_median() {
        let r = reconcile(&[100.0, 200.0], 2.0).unwrap();
        assert!(r.kept.is_empty());
        assert_eq!(r.price, 150.0);
    }

    #[test]
    fn test_reconcile_empty() {
        assert!(reconcile(&[], 2.0).is_none());
    }

    #[tokio::test]
    async fn test_failed_feeds_skipped() {
        let source = source(&[Some(100.0), None, Some(100.4)]);
        let price = source.current_price().await.unwrap();
        assert_relative_eq!(price, 100.2);
    }

    #[tokio::test]
    async fn test_all_feeds_down() {
        let source = source(&[None, None]);
        let err = source.current_price().await.unwrap_err();
        assert_eq!(err.kind(), ForecastErrorKind::SourceUnavailable);
        assert!(err.to_string().contains("a: "));
        assert!(err.to_string().contains("b: "));
    }

    #[tokio::test]
    async fn test_no_feeds() {
        let source = ReconciledPriceSource::new(Vec::new(), 2.0);
        let err = source.current_price().await.unwrap_err();
        assert!(err.to_string().contains("no price feeds"));
    }
}
