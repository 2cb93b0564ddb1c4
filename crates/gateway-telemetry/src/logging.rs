//! Logging setup.

use gateway_config::LoggingSettings;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging setup errors.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Filter directive could not be parsed
    #[error("Invalid log filter '{filter}': {message}")]
    Filter {
        /// Offending directive
        filter: String,
        /// Parser message
        message: String,
    },

    /// A global subscriber is already installed
    #[error("Failed to initialize logging: {0}")]
    Init(String),
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    pub level: String,
    /// Emit one JSON object per event
    pub json: bool,
    /// Include the event target
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the gateway's logging settings.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self::new()
            .with_level(&settings.level)
            .with_json(settings.json)
    }

    /// Set the default level or filter directive.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Switch JSON output on or off.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Show or hide event targets.
    #[must_use]
    pub fn with_target(mut self, with_target: bool) -> Self {
        self.with_target = with_target;
        self
    }

    /// The filter to install. `RUST_LOG` takes precedence over `level`.
    pub fn filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(&self.level).map_err(|e| LoggingError::Filter {
            filter: self.level.clone(),
            message: e.to_string(),
        })
    }
}

/// Install the global subscriber.
///
/// # Errors
/// Returns error if the filter is invalid or a subscriber is already set
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = config.filter()?;

    let fmt_layer = if config.json {
        fmt::layer()
            .json()
            .with_target(config.with_target)
            .with_current_span(true)
            .boxed()
    } else {
        fmt::layer().with_target(config.with_target).boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = LoggingConfig::new().with_level("debug").with_json(true).with_target(false);
        assert_eq!(config.level, "debug");
        assert!(config.json);
        assert!(!config.with_target);
    }

    #[test]
    fn test_from_settings() {
        let settings = LoggingSettings {
            level: "warn,gateway_server=debug".to_string(),
            json: true,
        };
        let config = LoggingConfig::from_settings(&settings);
        assert_eq!(config.level, "warn,gateway_server=debug");
        assert!(config.json);
    }

    #[test]
    fn test_invalid_filter() {
        let config = LoggingConfig::new().with_level("gateway_server=loud");
        if std::env::var("RUST_LOG").is_err() {
            assert!(matches!(config.filter(), Err(LoggingError::Filter { .. })));
        }
    }
}
