//! # Gateway Server
//!
//! HTTP edge server for the Touchbase gateway.
//!
//! This crate provides:
//! - Axum-based HTTP server with a single classifying handler
//! - CORS preflight handling and per-response header policy
//! - Client secret gate and backend credential injection
//! - Backend forwarding with streamed bodies and a GET response cache
//! - Chat completion proxy
//! - Request id propagation and request logging
//! - Graceful shutdown handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod forward;
pub mod handlers;
pub mod middleware;
pub mod openrouter;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

// Re-export main types
pub use error::{ApiError, ServerError};
pub use forward::Forwarder;
pub use openrouter::OpenRouterClient;
pub use routes::create_router;
pub use server::{Server, ServerConfig};
pub use shutdown::{shutdown_signal, ShutdownTrigger};
pub use state::{AppState, AppStateBuilder};
