//! Header names the gateway reads or writes that `http::header` does not define.

use http::HeaderName;

/// Pre-shared secret sent by the front end to authenticate to the gateway.
pub const X_CLIENT_SECRET: HeaderName = HeaderName::from_static("x-client-secret");

/// Backend API key header.
pub const APIKEY: HeaderName = HeaderName::from_static("apikey");

/// Diagnostic cache annotation (`HIT` or `MISS`).
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Request correlation id.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Scheme the client used to reach the edge.
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Browser feature grants.
pub const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

/// Hop-by-hop headers that never cross the proxy in either direction.
pub const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Whether a header is hop-by-hop.
#[must_use]
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}
