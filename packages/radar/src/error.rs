//! Error types for the radar.
//!
//! Only configuration faults and state-file write failures surface as
//! `RadarError`. Fetch failures, unparsable deadlines and corrupt state are
//! degraded locally by the component that meets them.

use thiserror::Error;

/// Main error type for the radar library.
#[derive(Debug, Error)]
pub enum RadarError {
    /// Invalid date format.
    #[error("Invalid date format: '{0}'. Expected YYYY-MM-DD (e.g., 2025-06-01)")]
    InvalidDate(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to fetch a page of the search feed.
    #[error("Failed to fetch feed page {page}: {source}")]
    PageFetch {
        page: u32,
        #[source]
        source: Box<RadarError>,
    },

    /// Non-retryable HTTP status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// Transient failures persisted through every retry.
    #[error("Request failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    /// Feed response did not have the expected envelope.
    #[error("Invalid feed response: {0}")]
    InvalidFeedResponse(String),

    /// Invalid URL.
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML config parsing error.
    #[error("YAML config error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A blocking fetch task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type alias for radar operations.
pub type Result<T> = std::result::Result<T, RadarError>;
