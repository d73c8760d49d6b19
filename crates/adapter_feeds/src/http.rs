//! HTTP JSON price feeds.

use crate::config::FeedSpec;
use crate::error::FeedError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// One upstream quote.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Fetches the feed's current price.
    async fn fetch(&self) -> Result<f64, FeedError>;

    /// Feed name.
    fn name(&self) -> &str;
}

/// Extracts a positive price at `pointer`.
///
/// Exchanges quote either JSON numbers or decimal strings; both are
/// accepted.
///
/// # Examples
///
/// ```rust
/// use adapter_feeds::parse_price;
/// use serde_json::json;
///
/// let body = json!({ "data": { "amount": "64123.50" } });
/// assert_eq!(parse_price(&body, "/data/amount").unwrap(), 64123.5);
/// ```
pub fn parse_price(body: &Value, pointer: &str) -> Result<f64, FeedError> {
    let value = body
        .pointer(pointer)
        .ok_or_else(|| FeedError::MissingField(pointer.to_string()))?;

    let price = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FeedError::InvalidPrice(n.to_string()))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| FeedError::InvalidPrice(s.clone()))?,
        other => return Err(FeedError::InvalidPrice(other.to_string())),
    };

    if price.is_finite() && price > 0.0 {
        Ok(price)
    } else {
        Err(FeedError::InvalidPrice(price.to_string()))
    }
}

/// Feed backed by a JSON HTTP endpoint.
#[derive(Clone, Debug)]
pub struct HttpPriceFeed {
    spec: FeedSpec,
    client: reqwest::Client,
}

impl HttpPriceFeed {
    /// Builds a feed with its own client and request timeout.
    pub fn new(spec: FeedSpec, timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("adapter_feeds/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(spec, client))
    }

    /// Builds a feed sharing an existing client.
    pub fn with_client(spec: FeedSpec, client: reqwest::Client) -> Self {
        Self { spec, client }
    }

    /// Feed specification.
    pub fn spec(&self) -> &FeedSpec {
        &self.spec
    }
}

#[async_trait]
impl PriceFeed for HttpPriceFeed {
    async fn fetch(&self) -> Result<f64, FeedError> {
        let response = self.client.get(&self.spec.url).send().await?;
        if !response.status().is_success() {
            return Err(FeedError::Status {
                url: self.spec.url.clone(),
                status: response.status().as_u16(),
            });
        }
        let body: Value = response.json().await?;
        parse_price(&body, &self.spec.pointer)
    }

    fn name(&self) -> &str {
        &self.spec.name
    }
}
