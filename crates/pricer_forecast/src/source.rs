//! Price Source port.
//!
//! The engine only needs one operation from the outside world: the current
//! reference price. Adapters (HTTP feeds, fixtures) implement
//! [`PriceSource`]; the engine treats any error as run-aborting.

use crate::error::ForecastError;
use async_trait::async_trait;

/// Supplier of the current reference price.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Returns the current, already reconciled, reference price.
    ///
    /// # Errors
    ///
    /// [`ForecastError::SourceUnavailable`] when no price can be obtained.
    async fn current_price(&self) -> Result<f64, ForecastError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Price source returning a constant.
#[derive(Clone, Copy, Debug)]
pub struct FixedPriceSource {
    price: f64,
}

impl FixedPriceSource {
    /// Creates a source that always returns `price`.
    pub fn new(price: f64) -> Self {
        Self { price }
    }
}

#[async_trait]
impl PriceSource for FixedPriceSource {
    async fn current_price(&self) -> Result<f64, ForecastError> {
        Ok(self.price)
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_source() {
        let source = FixedPriceSource::new(50_000.0);
        assert_eq!(source.current_price().await.unwrap(), 50_000.0);
        assert_eq!(source.name(), "fixed");
    }
}
