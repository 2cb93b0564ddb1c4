//! CORS policy for browser clients.
//!
//! Grants are per request: an allow-listed `Origin` is echoed back with
//! credentials enabled, anything else receives no CORS headers at all. The
//! browser then blocks client-side reads of the response.

use http::{header, HeaderMap, HeaderValue, Method};
use std::collections::HashSet;

/// Methods advertised on preflight responses.
pub const ALLOWED_METHODS: &str = "GET, POST, OPTIONS, PUT, DELETE, PATCH";

/// Request headers advertised on preflight responses.
pub const ALLOWED_HEADERS: &[&str] = &[
    "authorization",
    "x-client-info",
    "apikey",
    "content-type",
    "content-profile",
    "x-client-secret",
    "x-supabase-api-version",
    "prefer",
    "range",
    "accept-profile",
    "accept-language",
];

/// Preflight cache lifetime in seconds.
pub const MAX_AGE_SECS: u64 = 86_400;

/// Outcome of checking a request's `Origin` against the allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    /// No `Origin` header was sent
    Absent,
    /// Origin is allow-listed and will be echoed back
    Allowed(HeaderValue),
    /// Origin is present but not allow-listed
    Denied,
}

impl OriginDecision {
    /// The origin to echo, if any.
    #[must_use]
    pub fn allowed_origin(&self) -> Option<&HeaderValue> {
        match self {
            Self::Allowed(origin) => Some(origin),
            Self::Absent | Self::Denied => None,
        }
    }

    /// Whether the origin was present and refused.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied)
    }
}

/// Static origin allow-list.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    allowed_origins: HashSet<String>,
}

impl CorsPolicy {
    /// Create a policy from a list of origins.
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_origins: origins
                .into_iter()
                .map(|o| o.into().trim_end_matches('/').to_string())
                .collect(),
        }
    }

    /// Check the request's `Origin` header.
    #[must_use]
    pub fn decide(&self, request_headers: &HeaderMap) -> OriginDecision {
        let Some(origin) = request_headers.get(header::ORIGIN) else {
            return OriginDecision::Absent;
        };

        match origin.to_str() {
            Ok(value) if self.allowed_origins.contains(value) => {
                OriginDecision::Allowed(origin.clone())
            }
            _ => OriginDecision::Denied,
        }
    }

    /// CORS headers for a response to a request with the given method and
    /// origin decision.
    #[must_use]
    pub fn headers(&self, method: &Method, decision: &OriginDecision) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let Some(origin) = decision.allowed_origin() else {
            return headers;
        };

        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));

        if *method == Method::OPTIONS {
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOWED_METHODS),
            );
            if let Ok(value) = HeaderValue::from_str(&ALLOWED_HEADERS.join(", ")) {
                headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, value);
            }
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(MAX_AGE_SECS));
        }

        headers
    }

    /// Layer CORS headers onto a response's headers.
    ///
    /// Upstream CORS headers are replaced; `Vary` is appended so upstream
    /// values survive.
    pub fn apply(&self, method: &Method, decision: &OriginDecision, target: &mut HeaderMap) {
        for (name, value) in &self.headers(method, decision) {
            if *name == header::VARY {
                target.append(name.clone(), value.clone());
            } else {
                target.insert(name.clone(), value.clone());
            }
        }
    }
}
