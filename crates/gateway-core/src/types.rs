//! Domain types shared by the classifier, the credential injector and the server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of an incoming request path.
///
/// Every path maps to exactly one class. Function classes are the ones served
/// under the backend's function route prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathClass {
    /// Function endpoint reachable without the gateway secret
    Public,
    /// Function endpoint that requires a caller bearer token
    ProtectedFunction,
    /// Function endpoint that is called with the service-role credential
    ServiceFunction,
    /// Auth or REST route forwarded without function-specific logic
    Passthrough,
    /// Path outside every allowed prefix
    Rejected,
}

impl PathClass {
    /// Whether the path is served by the backend's function runtime.
    #[must_use]
    pub fn is_function(self) -> bool {
        matches!(
            self,
            Self::Public | Self::ProtectedFunction | Self::ServiceFunction
        )
    }

    /// Whether the request may be forwarded at all.
    #[must_use]
    pub fn is_forwardable(self) -> bool {
        !matches!(self, Self::Rejected)
    }

    /// Whether the gateway secret check is skipped for this class.
    #[must_use]
    pub fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }

    /// Stable name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::ProtectedFunction => "protected_function",
            Self::ServiceFunction => "service_function",
            Self::Passthrough => "passthrough",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PathClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The bearer credential attached to a forwarded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundCredential {
    /// The backend's anonymous (row-level secured) key
    AnonymousKey,
    /// The backend's elevated service-role key
    ServiceRoleKey,
    /// The caller's own `Authorization` header, forwarded untouched
    CallerProvidedToken,
}

impl OutboundCredential {
    /// Stable name used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AnonymousKey => "anonymous_key",
            Self::ServiceRoleKey => "service_role_key",
            Self::CallerProvidedToken => "caller_token",
        }
    }
}

impl fmt::Display for OutboundCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
