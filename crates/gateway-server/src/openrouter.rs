//! Chat completion proxy.
//!
//! The browser posts a completion request; the gateway forwards the body to
//! the completion provider with the server-held API key and streams the
//! answer back. The caller's own headers are not forwarded.

use axum::response::Response;
use bytes::Bytes;
use gateway_config::{ConfigError, OpenRouterSettings};
use gateway_core::{GatewayError, GatewayResult};
use http::{header, HeaderValue};
use secrecy::ExposeSecret;
use tracing::{debug, error};
use url::Url;

use crate::error::ServerError;
use crate::forward::{describe_transport_error, relay};

/// Client for the third-party completion endpoint.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: reqwest::Client,
    url: Url,
    authorization: Option<HeaderValue>,
}

impl std::fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("url", &self.url.as_str())
            .field("configured", &self.authorization.is_some())
            .finish_non_exhaustive()
    }
}

impl OpenRouterClient {
    /// Build the client from settings.
    pub fn from_settings(settings: &OpenRouterSettings) -> Result<Self, ServerError> {
        let client = reqwest::Client::builder().timeout(settings.timeout).build()?;
        let url = Url::parse(&settings.url)
            .map_err(|e| ConfigError::invalid_value("openrouter.url", e.to_string()))?;

        let authorization = match &settings.api_key {
            Some(key) if !key.expose_secret().is_empty() => {
                let mut value = HeaderValue::from_str(&format!("Bearer {}", key.expose_secret()))
                    .map_err(|_| GatewayError::internal("OpenRouter API key is not a valid header value"))?;
                value.set_sensitive(true);
                Some(value)
            }
            _ => None,
        };

        Ok(Self {
            client,
            url,
            authorization,
        })
    }

    /// Whether an API key is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.authorization.is_some()
    }

    /// Forward a completion request body and relay the answer.
    pub async fn complete(&self, body: Bytes) -> GatewayResult<Response> {
        let Some(authorization) = self.authorization.clone() else {
            error!("OpenRouter API key is not configured");
            return Err(GatewayError::third_party("API key not configured"));
        };

        debug!(bytes = body.len(), "Forwarding completion request");

        let upstream = self
            .client
            .post(self.url.clone())
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static(mime::APPLICATION_JSON.as_ref()),
            )
            .header(header::AUTHORIZATION, authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| GatewayError::third_party(describe_transport_error(&e)))?;

        Ok(relay(upstream, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[tokio::test]
    async fn test_missing_key_is_third_party_error() {
        let client = OpenRouterClient::from_settings(&OpenRouterSettings::default()).unwrap();
        assert!(!client.is_configured());

        let result = client.complete(Bytes::from_static(b"{}")).await;
        let error = result.err().unwrap();
        assert!(matches!(error, GatewayError::ThirdParty(_)));
        assert_eq!(error.public_message(), "OpenRouter API error");
    }

    #[test]
    fn test_debug_hides_key() {
        let settings = OpenRouterSettings {
            api_key: Some(SecretString::new("sk-or-secret".to_string())),
            ..Default::default()
        };
        let client = OpenRouterClient::from_settings(&settings).unwrap();
        assert!(client.is_configured());
        assert!(!format!("{client:?}").contains("sk-or-secret"));
    }
}
