//! Configuration error types.

use std::path::PathBuf;

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Configuration error type.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be parsed.
    #[error("Failed to parse config file {path}: {message}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Config file extension is not one we know how to parse.
    #[error("Unsupported config format: {0} (expected .yaml, .yml or .toml)")]
    UnsupportedFormat(PathBuf),

    /// An environment variable held an unparseable value.
    #[error("Invalid value for {name}: {message}")]
    InvalidValue {
        /// Variable or field name
        name: String,
        /// What was wrong
        message: String,
    },

    /// A required setting is missing.
    #[error("Missing required setting: {0}")]
    Missing(String),

    /// Settings are individually valid but inconsistent.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create an invalid-value error.
    pub fn invalid_value(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a validation error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}
