//! Pre-shared client secret check.

use gateway_core::headers::X_CLIENT_SECRET;
use gateway_core::{GatewayError, GatewayResult};
use http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

/// Verifies the `X-Client-Secret` header sent by the front end.
#[derive(Clone)]
pub struct ClientSecretGate {
    secret: SecretString,
}

impl std::fmt::Debug for ClientSecretGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretGate").finish_non_exhaustive()
    }
}

impl ClientSecretGate {
    /// Create a gate for the configured secret.
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Check the request headers.
    ///
    /// A missing header, a non-text value and a mismatch all fail the same
    /// way.
    pub fn verify(&self, headers: &HeaderMap) -> GatewayResult<()> {
        let expected = self.secret.expose_secret().as_bytes();
        if expected.is_empty() {
            return Err(GatewayError::Unauthorized);
        }

        let provided = headers
            .get(X_CLIENT_SECRET)
            .map(http::HeaderValue::as_bytes)
            .ok_or(GatewayError::Unauthorized)?;

        if bool::from(provided.ct_eq(expected)) {
            Ok(())
        } else {
            Err(GatewayError::Unauthorized)
        }
    }
}
