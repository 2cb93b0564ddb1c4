//! Backend credential selection.
//!
//! Every forwarded request carries the backend API key plus exactly one
//! bearer credential. Which one depends on the path class:
//!
//! | Class | Caller `Authorization` | Outbound bearer |
//! |-------|------------------------|-----------------|
//! | `ServiceFunction` | any | service-role key (overwrites) |
//! | `ProtectedFunction` | absent | request refused |
//! | `ProtectedFunction` | present | caller token |
//! | `Public` / `Passthrough` | absent | anonymous key |
//! | `Public` / `Passthrough` | present | caller token |

use gateway_core::headers::{is_hop_by_hop, APIKEY, X_CLIENT_SECRET};
use gateway_core::{GatewayError, GatewayResult, OutboundCredential, PathClass};
use http::{header, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

/// Copy of the inbound headers that is safe to send to the backend.
///
/// Hop-by-hop headers, `host` and the gateway secret are dropped.
#[must_use]
pub fn outbound_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut outbound = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound {
        if is_hop_by_hop(name) || *name == header::HOST || *name == X_CLIENT_SECRET {
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }
    outbound
}

/// Attaches backend credentials to outbound requests.
#[derive(Clone)]
pub struct CredentialInjector {
    api_key: HeaderValue,
    anon_bearer: HeaderValue,
    service_bearer: Option<HeaderValue>,
}

impl std::fmt::Debug for CredentialInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialInjector")
            .field("service_role", &self.service_bearer.is_some())
            .finish_non_exhaustive()
    }
}

impl CredentialInjector {
    /// Create an injector from the backend keys.
    ///
    /// Fails if a key cannot be carried in a header.
    pub fn new(anon_key: &SecretString, service_role_key: Option<&SecretString>) -> GatewayResult<Self> {
        let api_key = sensitive_value(anon_key.expose_secret(), "anonymous key")?;
        let anon_bearer = bearer(anon_key, "anonymous key")?;
        let service_bearer = service_role_key
            .map(|key| bearer(key, "service-role key"))
            .transpose()?;

        Ok(Self {
            api_key,
            anon_bearer,
            service_bearer,
        })
    }

    /// Set `Authorization` and `apikey` on an outbound header map.
    ///
    /// Returns which credential the request now carries.
    pub fn inject(&self, class: PathClass, headers: &mut HeaderMap) -> GatewayResult<OutboundCredential> {
        let has_caller_token = headers.contains_key(header::AUTHORIZATION);

        let credential = match class {
            PathClass::ServiceFunction => {
                let service = self
                    .service_bearer
                    .as_ref()
                    .ok_or_else(|| GatewayError::internal("service-role key is not configured"))?;
                headers.insert(header::AUTHORIZATION, service.clone());
                OutboundCredential::ServiceRoleKey
            }
            PathClass::ProtectedFunction => {
                if !has_caller_token {
                    return Err(GatewayError::MissingToken);
                }
                OutboundCredential::CallerProvidedToken
            }
            PathClass::Public | PathClass::Passthrough => {
                if has_caller_token {
                    OutboundCredential::CallerProvidedToken
                } else {
                    headers.insert(header::AUTHORIZATION, self.anon_bearer.clone());
                    OutboundCredential::AnonymousKey
                }
            }
            PathClass::Rejected => {
                return Err(GatewayError::internal("rejected path reached credential injection"));
            }
        };

        headers.insert(APIKEY, self.api_key.clone());
        debug!(class = %class, credential = %credential, "Injected backend credentials");

        Ok(credential)
    }
}

fn bearer(key: &SecretString, what: &str) -> GatewayResult<HeaderValue> {
    sensitive_value(&format!("Bearer {}", key.expose_secret()), what)
}

fn sensitive_value(value: &str, what: &str) -> GatewayResult<HeaderValue> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|_| GatewayError::internal(format!("{what} is not a valid header value")))?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn injector() -> CredentialInjector {
        CredentialInjector::new(
            &SecretString::new("anon".to_string()),
            Some(&SecretString::new("service".to_string())),
        )
        .unwrap()
    }

    fn with_token(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(token).unwrap());
        headers
    }

    #[test]
    fn test_service_function_overwrites_caller_token() {
        let mut headers = with_token("Bearer user-jwt");
        let credential = injector().inject(PathClass::ServiceFunction, &mut headers).unwrap();

        assert_eq!(credential, OutboundCredential::ServiceRoleKey);
        assert_eq!(headers[header::AUTHORIZATION], "Bearer service");
        assert_eq!(headers.get_all(header::AUTHORIZATION).iter().count(), 1);
        assert_eq!(headers[APIKEY], "anon");
    }

    #[test]
    fn test_service_function_without_caller_token() {
        let mut headers = HeaderMap::new();
        injector().inject(PathClass::ServiceFunction, &mut headers).unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer service");
    }

    #[test]
    fn test_service_function_without_configured_key() {
        let injector = CredentialInjector::new(&SecretString::new("anon".to_string()), None).unwrap();
        let result = injector.inject(PathClass::ServiceFunction, &mut HeaderMap::new());
        assert!(matches!(result, Err(GatewayError::Internal(_))));
    }

    #[test]
    fn test_protected_function_requires_token() {
        let mut headers = HeaderMap::new();
        let result = injector().inject(PathClass::ProtectedFunction, &mut headers);

        assert!(matches!(result, Err(GatewayError::MissingToken)));
        assert!(!headers.contains_key(APIKEY));
    }

    #[test]
    fn test_protected_function_keeps_caller_token() {
        let mut headers = with_token("Bearer user-jwt");
        let credential = injector().inject(PathClass::ProtectedFunction, &mut headers).unwrap();

        assert_eq!(credential, OutboundCredential::CallerProvidedToken);
        assert_eq!(headers[header::AUTHORIZATION], "Bearer user-jwt");
        assert_eq!(headers[APIKEY], "anon");
    }

    #[test]
    fn test_passthrough_defaults_to_anon_key() {
        let mut headers = HeaderMap::new();
        let credential = injector().inject(PathClass::Passthrough, &mut headers).unwrap();

        assert_eq!(credential, OutboundCredential::AnonymousKey);
        assert_eq!(headers[header::AUTHORIZATION], "Bearer anon");
        assert_eq!(headers[APIKEY], "anon");
    }

    #[test]
    fn test_public_keeps_caller_token() {
        let mut headers = with_token("Bearer user-jwt");
        let credential = injector().inject(PathClass::Public, &mut headers).unwrap();

        assert_eq!(credential, OutboundCredential::CallerProvidedToken);
        assert_eq!(headers[header::AUTHORIZATION], "Bearer user-jwt");
    }

    #[test]
    fn test_caller_apikey_is_replaced() {
        let mut headers = with_token("Bearer user-jwt");
        headers.insert(APIKEY, HeaderValue::from_static("caller-key"));
        injector().inject(PathClass::Passthrough, &mut headers).unwrap();
        assert_eq!(headers[APIKEY], "anon");
    }

    #[test]
    fn test_rejected_is_never_injected() {
        assert!(injector().inject(PathClass::Rejected, &mut HeaderMap::new()).is_err());
    }

    #[test]
    fn test_injected_values_are_sensitive() {
        let mut headers = HeaderMap::new();
        injector().inject(PathClass::Passthrough, &mut headers).unwrap();
        assert!(headers[header::AUTHORIZATION].is_sensitive());
        assert!(headers[APIKEY].is_sensitive());
    }

    #[test]
    fn test_outbound_headers_strip_gateway_and_hop_headers() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        inbound.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        inbound.insert(X_CLIENT_SECRET, HeaderValue::from_static("s3cret"));
        inbound.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        inbound.append("prefer", HeaderValue::from_static("return=representation"));
        inbound.append("prefer", HeaderValue::from_static("count=exact"));

        let outbound = outbound_headers(&inbound);

        assert!(!outbound.contains_key(header::HOST));
        assert!(!outbound.contains_key(header::CONNECTION));
        assert!(!outbound.contains_key(X_CLIENT_SECRET));
        assert_eq!(outbound[header::CONTENT_TYPE], "application/json");
        assert_eq!(outbound.get_all("prefer").iter().count(), 2);
    }
}
