//! Feed error types.

use thiserror::Error;

/// Failure of a single price feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Transport failure or timeout.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("Unexpected status {status} from {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// Nothing at the configured JSON pointer.
    #[error("No value at '{0}'")]
    MissingField(String),

    /// The value is not a usable price.
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Feed configuration rejected.
    #[error("Invalid feed configuration: {0}")]
    Config(String),
}
