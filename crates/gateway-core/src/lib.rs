//! # Gateway Core
//!
//! Core types and error handling for the Touchbase edge gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Path classes and outbound credential kinds
//! - Well-known header names
//! - The gateway error taxonomy and its JSON envelope

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod headers;
pub mod types;

// Re-export commonly used types
pub use error::{ErrorBody, GatewayError, GatewayResult};
pub use types::{OutboundCredential, PathClass};
