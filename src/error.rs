//! Error types for fetch-pipeline
//!
//! The pipeline itself never fails at the completion level: per-item failures are
//! folded into [`ResultItem::Absent`](crate::types::ResultItem::Absent) by the fetcher.
//! The types here describe failures at the boundaries instead:
//! - Configuration parsing and validation
//! - Source locator parsing
//! - Content retrieval and artifact persistence (the reason behind an `Absent`)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fetch-pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fetch-pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_in_flight")
        key: Option<String>,
    },

    /// A source locator could not be parsed
    #[error("invalid source locator '{locator}': {reason}")]
    InvalidSource {
        /// The rejected locator text
        locator: String,
        /// Why it was rejected
        reason: String,
    },

    /// Retrieval or persistence of a single item failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reasons a single fetch did not produce an artifact
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// Numeric HTTP status code
        status: u16,
        /// The requested URL
        url: String,
    },

    /// The content source cannot handle this locator's scheme
    #[error("unsupported scheme '{scheme}' for {url}")]
    UnsupportedScheme {
        /// The scheme that was rejected
        scheme: String,
        /// The full locator
        url: String,
    },

    /// The response body exceeded the configured maximum
    #[error("response body for {url} exceeds {limit} bytes")]
    BodyTooLarge {
        /// The requested URL
        url: String,
        /// Configured limit in bytes
        limit: u64,
    },

    /// Writing the artifact to local storage failed
    #[error("failed to persist artifact at {path}: {source}")]
    Persist {
        /// Destination path of the artifact
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Shorthand for a [`Error::Config`] tied to a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
