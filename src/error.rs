//! Error types for the reporting engine and its command-line boundary.

use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure to read one of the indicator relations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot read {relation} relation: {source}")]
    Io {
        relation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {relation} relation: {source}")]
    Csv {
        relation: &'static str,
        #[source]
        source: csv::Error,
    },
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum Error {
    /// Indicator store query could not be executed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid command-line or environment configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed payload or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
