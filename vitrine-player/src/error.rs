//! Error types for vitrine-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for vitrine-player
#[derive(Error, Debug)]
pub enum Error {
    /// Both directory endpoints failed (terminal for the session)
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// One directory entry could not be parsed (recovered by exclusion)
    #[error("Parse error in entry '{entry}': {reason}")]
    Parse { entry: String, reason: String },

    /// No entry of the directory payload survived parsing
    #[error("No displayable models: {0}")]
    EmptyDirectory(String),

    /// Model has no KPI rows and the policy refuses to display it
    #[error("No KPI data found for model: {model}")]
    MissingKpi { model: String },

    /// Platform asset conversion failed (attachment omitted)
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Viewer reported a render failure or the load timed out
    #[error("Render error: {0}")]
    Render(String),

    /// Configuration errors (missing model id, bad platform name)
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// vitrine-common error (camera pose parsing)
    #[error(transparent)]
    Common(#[from] vitrine_common::Error),
}

/// Remote fetch failures
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("Network error from {endpoint}: {reason}")]
    Network { endpoint: String, reason: String },

    #[error("HTTP error from {endpoint}: status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Invalid response body from {endpoint}: {reason}")]
    InvalidBody { endpoint: String, reason: String },

    #[error("Fetch cancelled")]
    Cancelled,

    /// Primary and fallback both failed; carries the fallback's cause
    #[error("Primary and fallback endpoints failed, last error: {0}")]
    BothEndpointsFailed(#[source] Box<FetchError>),

    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

/// Asset conversion failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("Conversion request failed: {0}")]
    Network(String),

    #[error("Conversion API returned status {0}")]
    Api(u16),

    #[error("Asset URL not found in conversion API response")]
    MissingAsset,

    #[error("Invalid conversion response: {0}")]
    InvalidBody(String),

    #[error("Invalid conversion API URL: {0}")]
    InvalidApiUrl(String),
}

/// Convenience Result type using vitrine-player Error
pub type Result<T> = std::result::Result<T, Error>;
