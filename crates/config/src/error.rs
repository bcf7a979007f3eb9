//! Configuration error types

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was set to an unparseable value
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Result type for configuration loading
pub type Result<T> = std::result::Result<T, ConfigError>;
