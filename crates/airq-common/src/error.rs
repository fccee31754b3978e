//! Error types for AirQ

use thiserror::Error;

/// Result type alias for AirQ operations
pub type Result<T> = std::result::Result<T, AirqError>;

/// Main error type for AirQ
#[derive(Error, Debug)]
pub enum AirqError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
