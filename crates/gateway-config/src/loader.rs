//! Configuration loading from files and the environment.

use crate::config::GatewayConfig;
use crate::error::{ConfigError, ConfigResult};
use humantime_serde::re::humantime;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Builder that assembles a [`GatewayConfig`] from defaults, an optional file
/// and the environment.
pub struct ConfigLoader {
    file: Option<PathBuf>,
    use_env: bool,
    env: EnvLookup,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader that reads the process environment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            file: None,
            use_env: true,
            env: Box::new(|name| std::env::var(name).ok()),
        }
    }

    /// Read settings from a YAML or TOML file.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Enable or disable environment overrides.
    #[must_use]
    pub fn with_env(mut self, enabled: bool) -> Self {
        self.use_env = enabled;
        self
    }

    /// Replace the environment source (used by tests).
    #[must_use]
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    /// Load, merge and validate the configuration.
    pub async fn load(self) -> ConfigResult<GatewayConfig> {
        let mut config = match &self.file {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                read_file(path).await?
            }
            None => GatewayConfig::default(),
        };

        if self.use_env {
            apply_env(&mut config, &self.env)?;
        }

        config.validate()?;
        Ok(config)
    }
}

async fn read_file(path: &Path) -> ConfigResult<GatewayConfig> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match extension.as_deref() {
        Some("yaml" | "yml") => serde_yaml::from_str(&contents).map_err(|e| parse_error(e.to_string())),
        Some("toml") => toml::from_str(&contents).map_err(|e| parse_error(e.to_string())),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn apply_env(config: &mut GatewayConfig, env: &EnvLookup) -> ConfigResult<()> {
    let var = |name: &str| env(name).filter(|v| !v.trim().is_empty());

    if let Some(url) = var("SUPABASE_URL") {
        config.backend.url = url;
    }
    if let Some(key) = var("SUPABASE_ANON_KEY") {
        config.backend.anon_key = SecretString::new(key);
    }
    if let Some(key) = var("SUPABASE_SERVICE_ROLE_KEY") {
        config.backend.service_role_key = Some(SecretString::new(key));
    }
    if let Some(secret) = var("CLIENT_SECRET") {
        config.security.client_secret = SecretString::new(secret);
    }
    if let Some(key) = var("OPENROUTER_API_KEY") {
        config.openrouter.api_key = Some(SecretString::new(key));
    }
    if let Some(origins) = var("ALLOWED_ORIGINS") {
        config.security.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some(host) = var("GATEWAY_HOST") {
        config.server.host = host;
    }
    if let Some(port) = var("GATEWAY_PORT") {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|e| ConfigError::invalid_value("GATEWAY_PORT", format!("{e}")))?;
    }
    if let Some(level) = var("GATEWAY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("GATEWAY_LOG_JSON") {
        config.logging.json = parse_bool("GATEWAY_LOG_JSON", &json)?;
    }
    if let Some(ttl) = var("GATEWAY_CACHE_TTL") {
        config.cache.ttl = parse_duration("GATEWAY_CACHE_TTL", &ttl)?;
    }
    if let Some(enabled) = var("GATEWAY_CACHE_ENABLED") {
        config.cache.enabled = parse_bool("GATEWAY_CACHE_ENABLED", &enabled)?;
    }
    if let Some(timeout) = var("GATEWAY_BACKEND_TIMEOUT") {
        config.backend.timeout = parse_duration("GATEWAY_BACKEND_TIMEOUT", &timeout)?;
    }

    debug!("Environment overrides applied");
    Ok(())
}

fn parse_bool(name: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid_value(name, format!("not a boolean: {other}"))),
    }
}

fn parse_duration(name: &str, value: &str) -> ConfigResult<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|e| ConfigError::invalid_value(name, e.to_string()))
}
