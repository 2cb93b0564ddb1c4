//! Gateway error types.
//!
//! Every variant carries a fixed public message. Upstream causes are kept on
//! the error so they can be logged, but [`GatewayError::public_message`] never
//! exposes them.

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Result type for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Gateway error type.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or incorrect gateway secret.
    #[error("Unauthorized")]
    Unauthorized,

    /// Protected function called without a bearer token.
    #[error("Unauthorized - No token provided")]
    MissingToken,

    /// Preflight from an origin outside the allow-list.
    #[error("Forbidden origin: {0}")]
    ForbiddenOrigin(String),

    /// Path outside every allowed prefix.
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// Verb not supported on a method-restricted route.
    #[error("Method {method} not allowed on {path}")]
    MethodNotAllowed {
        /// Rejected method
        method: String,
        /// Route path
        path: String,
    },

    /// Inbound body exceeded the configured limit.
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// Transport failure talking to the backend.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Transport failure talking to the third-party chat API.
    #[error("Third-party API error: {0}")]
    ThirdParty(String),

    /// Anything else that is our fault.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Create an upstream error.
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create a third-party error.
    pub fn third_party(msg: impl Into<String>) -> Self {
        Self::ThirdParty(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a method-not-allowed error.
    pub fn method_not_allowed(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::MethodNotAllowed {
            method: method.into(),
            path: path.into(),
        }
    }

    /// HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::MissingToken => StatusCode::UNAUTHORIZED,
            Self::ForbiddenOrigin(_) => StatusCode::FORBIDDEN,
            Self::RouteNotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upstream(_) | Self::ThirdParty(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Check if error is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Message safe to return to the caller.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Unauthorized => "Unauthorized",
            Self::MissingToken => "Unauthorized - No token provided",
            Self::ForbiddenOrigin(_) => "Forbidden",
            Self::RouteNotFound(_) => "Not Found",
            Self::MethodNotAllowed { .. } => "Method not allowed",
            Self::PayloadTooLarge { .. } => "Payload Too Large",
            Self::ThirdParty(_) => "OpenRouter API error",
            Self::Upstream(_) | Self::Internal(_) => "Internal Server Error",
        }
    }

    /// Optional extra detail safe to return to the caller.
    #[must_use]
    pub fn public_details(&self) -> Option<String> {
        match self {
            Self::MethodNotAllowed { .. } => Some("Only POST is supported".to_string()),
            Self::PayloadTooLarge { limit } => Some(format!("Maximum body size is {limit} bytes")),
            _ => None,
        }
    }

    /// JSON envelope for this error.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.public_message().to_string(),
            details: self.public_details(),
        }
    }
}

/// JSON error envelope: `{"error": "...", "details": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short public message
    pub error: String,
    /// Optional debugging detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(GatewayError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(GatewayError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            GatewayError::ForbiddenOrigin("https://evil.test".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            GatewayError::RouteNotFound("/x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::method_not_allowed("GET", "/api/openrouter").status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            GatewayError::upstream("connection refused").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_public_message_hides_cause() {
        let err = GatewayError::upstream("dns error: backend.internal not found");
        let body = serde_json::to_string(&err.to_body()).unwrap();
        assert_eq!(body, r#"{"error":"Internal Server Error"}"#);
        assert!(err.to_string().contains("backend.internal"));
    }

    #[test]
    fn test_not_found_body() {
        let body = GatewayError::RouteNotFound("/not-a-real-route".into()).to_body();
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"error":"Not Found"}"#);
    }

    #[test]
    fn test_method_not_allowed_has_details() {
        let body = GatewayError::method_not_allowed("GET", "/api/openrouter").to_body();
        assert_eq!(body.error, "Method not allowed");
        assert_eq!(body.details.as_deref(), Some("Only POST is supported"));
    }

    #[test]
    fn test_is_client_error() {
        assert!(GatewayError::Unauthorized.is_client_error());
        assert!(!GatewayError::internal("boom").is_client_error());
    }
}
