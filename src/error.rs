//! Error types for the Ratewall service.

use thiserror::Error;

/// Main error type for Ratewall operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ServiceError {
    fn from(err: config::ConfigError) -> Self {
        ServiceError::Config(err.to_string())
    }
}

/// Result type alias for Ratewall operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
