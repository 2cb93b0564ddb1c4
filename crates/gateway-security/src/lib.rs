//! # Gateway Security
//!
//! Origin policy, response hardening and credential handling for the
//! Touchbase edge gateway.
//!
//! ## Features
//!
//! - **CORS**: per-request grants for allow-listed origins
//! - **Security Headers**: HSTS, CSP, X-Frame-Options, Permissions-Policy, etc.
//! - **Client Secret Gate**: pre-shared secret check for non-public paths
//! - **Credential Injection**: backend bearer and API key selection per path class
//!
//! Everything here is a pure computation over static configuration and the
//! request's headers; nothing performs I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client_secret;
pub mod cors;
pub mod credentials;
pub mod headers;

pub use client_secret::ClientSecretGate;
pub use cors::{CorsPolicy, OriginDecision};
pub use credentials::{outbound_headers, CredentialInjector};
pub use headers::{apply_security_headers, CspBuilder, SecurityHeaders};
