//! # Touchbase Gateway
//!
//! Edge gateway in front of the Touchbase backend.
//!
//! ## Features
//!
//! - CORS allow-list with strict preflight handling
//! - Shared client secret for non-public paths
//! - Backend credential injection per path class
//! - Path allow-listing (everything else is 404)
//! - Short-lived caching of successful GET responses
//! - Chat completion proxy with a server-held API key
//!
//! ## Usage
//!
//! ```bash
//! # Configure from the environment (or a .env file)
//! SUPABASE_URL=https://project.supabase.co \
//! SUPABASE_ANON_KEY=... CLIENT_SECRET=... touchbase-gateway
//!
//! # Start with a config file
//! touchbase-gateway --config /path/to/gateway.yaml
//!
//! # Override the listener
//! touchbase-gateway --port 9000 --json-logs
//! ```

use anyhow::Context;
use clap::Parser;
use gateway_config::{ConfigLoader, GatewayConfig};
use gateway_server::{AppState, Server, ServerConfig};
use gateway_telemetry::{init_logging, LoggingConfig};
use std::path::PathBuf;
use tracing::{error, info};

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "touchbase-gateway", version, about = "Edge gateway for the Touchbase backend")]
struct Cli {
    /// Configuration file (YAML or TOML)
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Bind host
    #[arg(long)]
    host: Option<String>,

    /// Bind port
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level or filter directive
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(&self, config: &mut GatewayConfig) {
        if let Some(host) = &self.host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
        if self.json_logs {
            config.logging.json = true;
        }
    }
}

/// Application entry point
#[tokio::main]
async fn main() {
    // A missing .env file is normal in production.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        // Logging may not be up yet if configuration failed.
        eprintln!("touchbase-gateway: {e:#}");
        error!(error = %format!("{e:#}"), "Gateway failed");
        std::process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let mut config = loader.load().await.context("loading configuration")?;
    cli.apply(&mut config);

    init_logging(&LoggingConfig::from_settings(&config.logging))
        .context("initializing logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        origins = config.security.allowed_origins.len(),
        cache = config.cache.enabled,
        "Starting Touchbase gateway"
    );

    let server_config = ServerConfig::new()
        .with_host(&config.server.host)
        .with_port(config.server.port)
        .with_shutdown_timeout(config.server.shutdown_timeout);

    let state = AppState::builder()
        .config(config)
        .build()
        .context("building gateway state")?;

    Server::new(server_config, state)
        .run()
        .await
        .context("running server")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "touchbase-gateway",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--log-level",
            "debug",
            "--json-logs",
        ]);

        let mut config = GatewayConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_cli_defaults_leave_config_alone() {
        let cli = Cli::parse_from(["touchbase-gateway"]);
        let mut config = GatewayConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.server.port, 8787);
        assert!(!config.logging.json);
    }
}
