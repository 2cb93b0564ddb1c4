//! # Gateway Config
//!
//! Configuration management for the Touchbase edge gateway.
//!
//! Configuration is assembled once at start-up from, in increasing priority:
//! - built-in defaults
//! - an optional YAML or TOML file
//! - environment variables
//!
//! The result is validated and then treated as immutable for the life of the
//! process.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod loader;

pub use config::{
    BackendConfig, CacheSettings, CspSettings, GatewayConfig, LoggingSettings,
    OpenRouterSettings, RoutingSettings, SecuritySettings, ServerSettings,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
