//! Security response headers.

use gateway_config::{CspSettings, SecuritySettings};
use gateway_core::headers::PERMISSIONS_POLICY;
use http::{header, HeaderMap, HeaderValue};
use tracing::warn;

/// Precomputed security header set applied to non-function responses.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: HeaderMap,
}

impl SecurityHeaders {
    /// Build the header set from security settings.
    ///
    /// Values that are not valid header text are skipped with a warning
    /// rather than failing start-up.
    #[must_use]
    pub fn from_settings(settings: &SecuritySettings) -> Self {
        let mut headers = HeaderMap::new();

        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        headers.insert(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        );

        let hsts = build_hsts_header(settings.hsts_max_age, true, true);
        insert_dynamic(&mut headers, header::STRICT_TRANSPORT_SECURITY, &hsts);

        let csp = csp_from_settings(&settings.csp);
        insert_dynamic(&mut headers, header::CONTENT_SECURITY_POLICY, &csp);

        if !settings.permissions_policy.is_empty() {
            insert_dynamic(&mut headers, PERMISSIONS_POLICY, &settings.permissions_policy);
        }

        Self { headers }
    }

    /// The computed header set.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        Self::from_settings(&SecuritySettings::default())
    }
}

fn insert_dynamic(headers: &mut HeaderMap, name: header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => warn!(header = %name, "Skipping security header with invalid value"),
    }
}

/// Apply security headers to a header map, replacing any upstream values.
pub fn apply_security_headers(policy: &SecurityHeaders, headers: &mut HeaderMap) {
    for (name, value) in policy.headers() {
        headers.insert(name.clone(), value.clone());
    }
}

/// Build HSTS header value.
#[must_use]
pub fn build_hsts_header(max_age: u64, include_subdomains: bool, preload: bool) -> String {
    let mut value = format!("max-age={max_age}");
    if include_subdomains {
        value.push_str("; includeSubDomains");
    }
    if preload {
        value.push_str("; preload");
    }
    value
}

/// Build a Content-Security-Policy from per-directive source lists.
#[must_use]
pub fn csp_from_settings(csp: &CspSettings) -> String {
    CspBuilder::new()
        .directive("default-src", &csp.default_src)
        .directive("connect-src", &csp.connect_src)
        .directive("script-src", &csp.script_src)
        .directive("style-src", &csp.style_src)
        .directive("img-src", &csp.img_src)
        .directive("font-src", &csp.font_src)
        .directive("frame-ancestors", &["'self'"])
        .directive("object-src", &["'none'"])
        .directive("base-uri", &["'self'"])
        .directive("frame-src", &csp.frame_src)
        .directive("worker-src", &csp.worker_src)
        .directive("child-src", &csp.child_src)
        .directive("manifest-src", &csp.manifest_src)
        .directive("media-src", &csp.media_src)
        .build()
}

/// Content-Security-Policy builder.
#[derive(Debug, Default)]
pub struct CspBuilder {
    directives: Vec<(String, Vec<String>)>,
}

impl CspBuilder {
    /// Create a new CSP builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directive. Directives with no sources are omitted.
    #[must_use]
    pub fn directive<S: AsRef<str>>(mut self, name: &str, sources: &[S]) -> Self {
        if !sources.is_empty() {
            self.directives.push((
                name.to_string(),
                sources.iter().map(|s| s.as_ref().to_string()).collect(),
            ));
        }
        self
    }

    /// Build the CSP header value.
    #[must_use]
    pub fn build(self) -> String {
        self.directives
            .into_iter()
            .map(|(directive, sources)| format!("{} {}", directive, sources.join(" ")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_security_headers() {
        let policy = SecurityHeaders::default();
        let mut headers = HeaderMap::new();

        apply_security_headers(&policy, &mut headers);

        assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::REFERRER_POLICY], "strict-origin-when-cross-origin");
        assert_eq!(
            headers[header::STRICT_TRANSPORT_SECURITY],
            "max-age=31536000; includeSubDomains; preload"
        );
        assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY));
        assert!(headers.contains_key("permissions-policy"));
    }

    #[test]
    fn test_overrides_upstream_values() {
        let mut headers = HeaderMap::new();
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("ALLOWALL"));

        apply_security_headers(&SecurityHeaders::default(), &mut headers);

        assert_eq!(headers.get_all(header::X_FRAME_OPTIONS).iter().count(), 1);
        assert_eq!(headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
    }

    #[test]
    fn test_default_csp_directives() {
        let csp = csp_from_settings(&CspSettings::default());

        for directive in [
            "default-src 'self'",
            "object-src 'none'",
            "base-uri 'self'",
            "connect-src 'self' https://*.supabase.co",
            "img-src 'self' data: https://* blob:",
            "worker-src 'self' blob:",
            "child-src 'self' blob:",
            "manifest-src 'self'",
            "media-src 'self'",
        ] {
            assert!(csp.contains(directive), "missing {directive} in {csp}");
        }
    }

    #[test]
    fn test_empty_directive_is_omitted() {
        let csp = CspBuilder::new()
            .directive("default-src", &["'self'"])
            .directive::<&str>("frame-src", &[])
            .build();
        assert_eq!(csp, "default-src 'self'");
    }

    #[test]
    fn test_hsts_builder() {
        assert_eq!(
            build_hsts_header(31_536_000, true, true),
            "max-age=31536000; includeSubDomains; preload"
        );
        assert_eq!(build_hsts_header(3600, false, false), "max-age=3600");
    }

    #[test]
    fn test_invalid_permissions_policy_is_skipped() {
        let settings = SecuritySettings {
            permissions_policy: "camera=self\n".to_string(),
            ..Default::default()
        };
        let policy = SecurityHeaders::from_settings(&settings);
        assert!(!policy.headers().contains_key("permissions-policy"));
        assert!(policy.headers().contains_key(header::X_FRAME_OPTIONS));
    }
}
