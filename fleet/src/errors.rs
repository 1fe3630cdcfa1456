//! Error types for wpfleet

use thiserror::Error;

/// Main error type for wpfleet
///
/// Every variant renders as the one-line message shown to the operator, so
/// callers can surface `err.to_string()` directly.
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Not authenticated: run `wpfleet login` first")]
    NotAuthenticated,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("Panel reported an error: {0}")]
    VendorError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Archive error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for FleetError {
    fn from(err: reqwest::Error) -> Self {
        FleetError::Transport(err.to_string())
    }
}

impl From<anyhow::Error> for FleetError {
    fn from(err: anyhow::Error) -> Self {
        FleetError::Internal(err.to_string())
    }
}
