//! # Gateway Routing
//!
//! Path classification for the Touchbase edge gateway.
//!
//! This crate provides:
//! - An explicit, ordered route table built from configuration
//! - Dot-segment resolution so a path is classified as the backend will see it
//! - Pure classification of a request path into a [`PathClass`]
//! - Lookup of the gateway's own special routes
//!
//! [`PathClass`]: gateway_core::PathClass

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod table;

// Re-export main types
pub use table::{normalize_path, PathMatcher, RouteEntry, RouteTable, RoutedPath, SpecialRoute};
