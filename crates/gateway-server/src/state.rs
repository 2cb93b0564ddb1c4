//! Shared application state.

use gateway_config::GatewayConfig;
use gateway_resilience::{CacheStore, MemoryCacheStore};
use gateway_routing::RouteTable;
use gateway_security::{ClientSecretGate, CorsPolicy, CredentialInjector, SecurityHeaders};
use std::sync::Arc;
use tracing::info;

use crate::error::ServerError;
use crate::forward::Forwarder;
use crate::openrouter::OpenRouterClient;

/// State shared by every request.
///
/// Everything here is immutable after start-up apart from the cache store.
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration
    pub config: Arc<GatewayConfig>,
    /// Path classifier
    pub routes: Arc<RouteTable>,
    /// Origin allow-list
    pub cors: Arc<CorsPolicy>,
    /// Hardening headers for non-function responses
    pub security_headers: Arc<SecurityHeaders>,
    /// Client secret check
    pub secret_gate: Arc<ClientSecretGate>,
    /// Backend credential selection
    pub credentials: Arc<CredentialInjector>,
    /// Backend client
    pub forwarder: Forwarder,
    /// Completion proxy client
    pub openrouter: OpenRouterClient,
    /// Response cache, absent when caching is disabled
    pub cache: Option<Arc<dyn CacheStore>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("routes", &self.routes.entries().len())
            .field("forwarder", &self.forwarder)
            .field("cache", &self.cache.as_ref().map(|c| c.name()))
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create a builder.
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }
}

/// Builder for [`AppState`].
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<GatewayConfig>,
    cache: Option<Arc<dyn CacheStore>>,
}

impl AppStateBuilder {
    /// Set the configuration.
    #[must_use]
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a specific cache store instead of the in-memory default.
    #[must_use]
    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(store);
        self
    }

    /// Build the state, deriving policies and clients from the configuration.
    pub fn build(self) -> Result<AppState, ServerError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let cache = if config.cache.enabled {
            let store: Arc<dyn CacheStore> = match self.cache {
                Some(store) => store,
                None => Arc::new(MemoryCacheStore::from_settings(&config.cache)),
            };
            info!(
                store = store.name(),
                ttl_secs = store.ttl().as_secs(),
                "Response cache enabled"
            );
            Some(store)
        } else {
            info!("Response cache disabled");
            None
        };

        let credentials = CredentialInjector::new(
            &config.backend.anon_key,
            config.backend.service_role_key.as_ref(),
        )?;

        Ok(AppState {
            routes: Arc::new(RouteTable::from_settings(&config.routing)),
            cors: Arc::new(CorsPolicy::new(config.security.allowed_origins.iter().cloned())),
            security_headers: Arc::new(SecurityHeaders::from_settings(&config.security)),
            secret_gate: Arc::new(ClientSecretGate::new(config.security.client_secret.clone())),
            credentials: Arc::new(credentials),
            forwarder: Forwarder::from_config(&config.backend)?,
            openrouter: OpenRouterClient::from_settings(&config.openrouter)?,
            cache,
            config: Arc::new(config),
        })
    }
}
