//! Error responses and server start-up errors.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use gateway_config::ConfigError;
use gateway_core::{ErrorBody, GatewayError};
use thiserror::Error;
use tracing::{debug, error};

/// Error returned by request handlers.
///
/// Renders as `{"error": "..."}` with the status of the wrapped
/// [`GatewayError`]. Server-side causes are logged and never sent.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl ApiError {
    /// Wrapped gateway error.
    #[must_use]
    pub fn inner(&self) -> &GatewayError {
        &self.0
    }

    /// Body that will be sent.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        self.0.to_body()
    }
}

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "Request failed");
        } else {
            debug!(status = status.as_u16(), error = %self.0, "Request rejected");
        }

        (status, Json(self.body())).into_response()
    }
}

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invalid credential or route material
    #[error("Invalid gateway setup: {0}")]
    Setup(#[from] GatewayError),

    /// HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// Listener failure
    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};

    #[test]
    fn test_not_found_response() {
        let response = ApiError::from(GatewayError::RouteNotFound("/nope".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_internal_cause_is_not_in_body() {
        let error = ApiError::from(GatewayError::upstream("connect refused to 10.0.0.1"));
        let body = error.body();
        assert_eq!(body.error, "Internal Server Error");
        assert!(body.details.is_none());
    }

    #[test]
    fn test_method_not_allowed_details() {
        let error = ApiError::from(GatewayError::method_not_allowed("GET", "/api/openrouter"));
        assert_eq!(error.inner().status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(error.body().details.as_deref(), Some("Only POST is supported"));
    }
}
