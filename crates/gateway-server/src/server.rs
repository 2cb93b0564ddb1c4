//! HTTP listener.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::ServerError;
use crate::routes::create_router;
use crate::shutdown::{shutdown_signal, ShutdownTrigger};
use crate::state::AppState;

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Grace period for in-flight requests after a shutdown signal
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8787,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the bind port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Bind address as `host:port`.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The gateway server.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a server.
    #[must_use]
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Bind and serve until Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        self.serve(listener, async {
            shutdown_signal().await;
        })
        .await
    }

    /// Serve on an existing listener until `shutdown` resolves.
    ///
    /// In-flight requests get the configured grace period to finish.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = listener.local_addr()?;
        let cache = self.state.cache.clone();
        let router = create_router(self.state);

        let trigger = ShutdownTrigger::new();
        let signal_trigger = trigger.clone();

        info!(address = %addr, "Gateway listening");

        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            shutdown.await;
            signal_trigger.trigger();
            info!("Draining in-flight requests");
        });

        tokio::select! {
            result = server.into_future() => result?,
            () = trigger.drain_deadline(self.config.shutdown_timeout) => {
                warn!(
                    grace_secs = self.config.shutdown_timeout.as_secs(),
                    "Shutdown grace period elapsed, dropping remaining connections"
                );
            }
        }

        if let Some(cache) = cache {
            let stats = cache.stats();
            info!(
                hits = stats.hits,
                misses = stats.misses,
                stores = stats.stores,
                evictions = stats.evictions,
                hit_rate = stats.hit_rate(),
                "Cache statistics"
            );
        }

        info!("Gateway stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_builder() {
        let config = ServerConfig::new()
            .with_host("127.0.0.1")
            .with_port(9000)
            .with_shutdown_timeout(Duration::from_secs(5));

        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }
}
