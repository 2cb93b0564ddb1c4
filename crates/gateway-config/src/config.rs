//! Gateway configuration types.

use crate::error::{ConfigError, ConfigResult};
use gateway_core::PathClass;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Prefix under which the backend serves functions.
pub const FUNCTION_PREFIX: &str = "/functions/v1/";

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener settings
    pub server: ServerSettings,
    /// Backend data service
    pub backend: BackendConfig,
    /// Path allow-lists
    pub routing: RoutingSettings,
    /// Origins, secrets and response hardening
    pub security: SecuritySettings,
    /// GET response cache
    pub cache: CacheSettings,
    /// Third-party chat completion proxy
    pub openrouter: OpenRouterSettings,
    /// Log output
    pub logging: LoggingSettings,
}

impl GatewayConfig {
    /// Check that the configuration can serve traffic.
    pub fn validate(&self) -> ConfigResult<()> {
        self.backend.validate()?;
        self.routing.validate()?;
        self.security.validate()?;
        self.cache.validate()?;
        self.openrouter.validate()?;

        if self.server.max_request_body_bytes == 0 {
            return Err(ConfigError::invalid("server.max_request_body_bytes must be > 0"));
        }

        Ok(())
    }
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Largest inbound body the gateway will buffer
    pub max_request_body_bytes: usize,
    /// How long to wait for in-flight requests on shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            max_request_body_bytes: 10 * 1024 * 1024,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Backend data service settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL requests are rewritten against
    pub url: String,
    /// Anonymous key, sent as `apikey` and as the default bearer
    pub anon_key: SecretString,
    /// Service-role key for service functions
    pub service_role_key: Option<SecretString>,
    /// Upper bound on a whole backend exchange
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Upper bound on establishing a connection
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: SecretString::new(String::new()),
            service_role_key: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl BackendConfig {
    /// Parsed base URL.
    pub fn base_url(&self) -> ConfigResult<Url> {
        if self.url.is_empty() {
            return Err(ConfigError::Missing("backend.url (SUPABASE_URL)".to_string()));
        }
        let url = Url::parse(&self.url)
            .map_err(|e| ConfigError::invalid_value("backend.url", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid_value(
                "backend.url",
                format!("unsupported scheme {}", url.scheme()),
            ));
        }
        Ok(url)
    }

    fn validate(&self) -> ConfigResult<()> {
        self.base_url()?;
        if self.anon_key.expose_secret().is_empty() {
            return Err(ConfigError::Missing(
                "backend.anon_key (SUPABASE_ANON_KEY)".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid("backend.timeout must be > 0"));
        }
        Ok(())
    }
}

/// Path allow-lists.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    /// Function paths reachable without the gateway secret
    pub public_endpoints: Vec<String>,
    /// Function paths called with the service-role key
    pub service_endpoints: Vec<String>,
    /// Non-function prefixes forwarded as-is
    pub passthrough_prefixes: Vec<String>,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            public_endpoints: vec!["/functions/v1/get-user-stats".to_string()],
            service_endpoints: vec!["/functions/v1/admin-stats".to_string()],
            passthrough_prefixes: vec!["/auth/v1/".to_string(), "/rest/v1/".to_string()],
        }
    }
}

impl RoutingSettings {
    fn validate(&self) -> ConfigResult<()> {
        for path in self.public_endpoints.iter().chain(&self.service_endpoints) {
            if !path.starts_with(FUNCTION_PREFIX) {
                return Err(ConfigError::invalid(format!(
                    "endpoint {path} is not under {FUNCTION_PREFIX}"
                )));
            }
        }

        let public: HashSet<&str> = self.public_endpoints.iter().map(String::as_str).collect();
        if let Some(dup) = self
            .service_endpoints
            .iter()
            .find(|p| public.contains(p.as_str()))
        {
            return Err(ConfigError::invalid(format!(
                "endpoint {dup} is listed as both public and service"
            )));
        }

        for prefix in &self.passthrough_prefixes {
            if !prefix.starts_with('/') || !prefix.ends_with('/') {
                return Err(ConfigError::invalid(format!(
                    "passthrough prefix {prefix} must start and end with '/'"
                )));
            }
            if prefix.starts_with(FUNCTION_PREFIX) || FUNCTION_PREFIX.starts_with(prefix.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "passthrough prefix {prefix} overlaps the function prefix"
                )));
            }
        }

        Ok(())
    }
}

/// Origin allow-list, gateway secret and response hardening.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Pre-shared secret expected in `X-Client-Secret`
    pub client_secret: SecretString,
    /// Origins granted CORS access
    pub allowed_origins: Vec<String>,
    /// Content-Security-Policy sources
    pub csp: CspSettings,
    /// Permissions-Policy header value
    pub permissions_policy: String,
    /// HSTS max-age in seconds
    pub hsts_max_age: u64,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            client_secret: SecretString::new(String::new()),
            allowed_origins: vec![
                "https://touchbase.site".to_string(),
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            csp: CspSettings::default(),
            permissions_policy: "geolocation=self, payment=*, camera=self, microphone=self, \
                                 magnetometer=self, accelerometer=self, gyroscope=self"
                .to_string(),
            hsts_max_age: 31_536_000,
        }
    }
}

impl SecuritySettings {
    fn validate(&self) -> ConfigResult<()> {
        if self.client_secret.expose_secret().is_empty() {
            return Err(ConfigError::Missing(
                "security.client_secret (CLIENT_SECRET)".to_string(),
            ));
        }
        for origin in &self.allowed_origins {
            if origin == "*" {
                return Err(ConfigError::invalid(
                    "wildcard origin cannot be combined with credentialed CORS",
                ));
            }
            Url::parse(origin)
                .map_err(|e| ConfigError::invalid_value("security.allowed_origins", format!("{origin}: {e}")))?;
        }
        Ok(())
    }
}

/// Allowed sources per Content-Security-Policy directive.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CspSettings {
    /// `default-src`
    pub default_src: Vec<String>,
    /// `connect-src`
    pub connect_src: Vec<String>,
    /// `script-src`
    pub script_src: Vec<String>,
    /// `style-src`
    pub style_src: Vec<String>,
    /// `img-src`
    pub img_src: Vec<String>,
    /// `font-src`
    pub font_src: Vec<String>,
    /// `frame-src`
    pub frame_src: Vec<String>,
    /// `worker-src`
    pub worker_src: Vec<String>,
    /// `child-src`
    pub child_src: Vec<String>,
    /// `manifest-src`
    pub manifest_src: Vec<String>,
    /// `media-src`
    pub media_src: Vec<String>,
}

fn sources(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

impl Default for CspSettings {
    fn default() -> Self {
        Self {
            default_src: sources(&["'self'"]),
            connect_src: sources(&[
                "'self'",
                "https://*.supabase.co",
                "https://*.groq.com",
                "https://api.brevo.com",
                "https://openrouter.ai",
                "https://api.openrouter.ai",
                "https://*.googleapis.com",
                "https://*.firebaseapp.com",
                "https://fcm.googleapis.com",
                "https://fcmregistrations.googleapis.com",
                "https://*.paypal.com",
                "https://api-m.paypal.com",
                "https://vitals.vercel-insights.com",
                "https://play.google.com",
                "https://www.gstatic.com/firebasejs/",
                "wss://*.firebaseio.com",
                "https://api.touchbase.site",
            ]),
            script_src: sources(&[
                "'self'",
                "'unsafe-inline'",
                "https://*.paypal.com",
                "https://va.vercel-scripts.com",
                "https://*.firebaseapp.com",
                "https://*.googleapis.com",
                "https://www.gstatic.com",
                "https://play.google.com",
                "https://static.cloudflareinsights.com",
            ]),
            style_src: sources(&["'self'", "'unsafe-inline'", "https://cdn.jsdelivr.net"]),
            img_src: sources(&["'self'", "data:", "https://*", "blob:"]),
            font_src: sources(&["'self'", "data:"]),
            frame_src: sources(&[
                "https://*.paypal.com",
                "https://api-m.paypal.com",
                "https://*.firebaseapp.com",
                "https://play.google.com",
            ]),
            worker_src: sources(&["'self'", "blob:", "https://www.gstatic.com/firebasejs/"]),
            child_src: sources(&["'self'", "blob:"]),
            manifest_src: sources(&["'self'"]),
            media_src: sources(&["'self'"]),
        }
    }
}

/// GET response cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Whether GET responses are cached
    pub enabled: bool,
    /// Freshness window
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Upper bound on stored entries
    pub max_entries: usize,
    /// Responses with larger bodies are relayed but not stored
    pub max_body_bytes: usize,
    /// Scheme used in cache keys when `X-Forwarded-Proto` is absent
    pub default_scheme: String,
    /// Path classes whose GET responses may be cached.
    ///
    /// The cache key is the request URL only, so a cached response is served
    /// to every caller of that URL whatever bearer token they send. Responses
    /// scoped to the caller (row-level secured `/rest/v1/*` reads, protected
    /// functions) can leak between users for up to `ttl`. Set this to
    /// `[public]` to cache only responses that are the same for everyone.
    pub cacheable_classes: Vec<PathClass>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(60),
            max_entries: 10_000,
            max_body_bytes: 1024 * 1024,
            default_scheme: "https".to_string(),
            cacheable_classes: vec![
                PathClass::Public,
                PathClass::ProtectedFunction,
                PathClass::ServiceFunction,
                PathClass::Passthrough,
            ],
        }
    }
}

impl CacheSettings {
    /// Whether GET responses for this path class may be cached.
    #[must_use]
    pub fn is_cacheable(&self, class: PathClass) -> bool {
        self.enabled && self.cacheable_classes.contains(&class)
    }

    fn validate(&self) -> ConfigResult<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.ttl.is_zero() {
            return Err(ConfigError::invalid("cache.ttl must be > 0 when caching is enabled"));
        }
        if self.max_entries == 0 {
            return Err(ConfigError::invalid("cache.max_entries must be > 0"));
        }
        if !matches!(self.default_scheme.as_str(), "http" | "https") {
            return Err(ConfigError::invalid_value(
                "cache.default_scheme",
                "expected http or https",
            ));
        }
        if self.cacheable_classes.contains(&PathClass::Rejected) {
            return Err(ConfigError::invalid_value(
                "cache.cacheable_classes",
                "rejected paths are never forwarded",
            ));
        }
        Ok(())
    }
}

/// Third-party chat completion proxy settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenRouterSettings {
    /// Completion endpoint
    pub url: String,
    /// Server-held API key
    pub api_key: Option<SecretString>,
    /// Upper bound on a whole exchange
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for OpenRouterSettings {
    fn default() -> Self {
        Self {
            url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            api_key: None,
            timeout: Duration::from_secs(120),
        }
    }
}

impl OpenRouterSettings {
    fn validate(&self) -> ConfigResult<()> {
        Url::parse(&self.url)
            .map_err(|e| ConfigError::invalid_value("openrouter.url", e.to_string()))?;
        Ok(())
    }
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level filter; `RUST_LOG` wins when set
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
