//! Error types for data operations.
//!
//! This module defines [`DataError`] which covers every failure at the provider
//! boundary. Inside the engine, missing or degenerate inputs never surface as
//! errors; they become undefined metrics instead.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while fetching or validating analysis inputs.
#[derive(Error, Debug, Clone)]
pub enum DataError {
    /// Network-related errors (connection failures, HTTP errors, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded by a provider.
    #[error("Rate limited by {provider}: retry after {retry_after:?}")]
    RateLimited {
        /// The provider that rate limited the request.
        provider: String,
        /// Suggested time to wait before retrying.
        retry_after: Option<Duration>,
    },

    /// A provider did not answer within the configured bound.
    #[error("{provider} timed out after {after:?} fetching {what}")]
    Timeout {
        /// The provider that timed out.
        provider: String,
        /// What was being fetched.
        what: String,
        /// The bound that elapsed.
        after: Duration,
    },

    /// The requested symbol was not found.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// Data is not available for the requested symbol.
    #[error("Data not available for {symbol}: {what}")]
    DataNotAvailable {
        /// The symbol that was requested.
        symbol: String,
        /// Description of the missing data.
        what: String,
    },

    /// Error parsing data from a provider.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The requested provider is not configured.
    #[error("Provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The requested feature is not supported.
    #[error("Feature not supported: {0}")]
    NotSupported(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl DataError {
    /// Returns true for failures that another provider might not have.
    ///
    /// Invalid parameters are the caller's fault and are never retried elsewhere.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidParameter(_))
    }
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;
