//! # Gateway Telemetry
//!
//! Observability for the Touchbase edge gateway.
//!
//! This crate provides:
//! - Structured logging (plain text or JSON)
//! - `RUST_LOG`-style filtering on top of the configured level

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;

// Re-export main types
pub use logging::{init_logging, LoggingConfig, LoggingError};
