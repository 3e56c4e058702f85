//! Error types and handling.

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// Sign-in rejected or session missing
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Response body could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Excel export error
    #[error("Export error: {0}")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Export requested with an empty record list
    #[error("No data to export")]
    NoData,
}

/// Result type alias for AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Create an auth error with message
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a config error with message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error with message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether this is the non-fatal "nothing to export" condition.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }
}
