//! Route table and path classifier.

use gateway_config::config::FUNCTION_PREFIX;
use gateway_config::RoutingSettings;
use gateway_core::PathClass;
use url::Url;

/// Path of the third-party chat completion proxy.
pub const OPENROUTER_PATH: &str = "/api/openrouter";

const NORMALIZE_BASE: &str = "http://gateway.invalid/";

/// Resolve `.` and `..` segments, percent-encoded ones included, the same way
/// the backend client serialises the outbound URL.
///
/// Returns `None` only if the path cannot be placed on a URL at all.
#[must_use]
pub fn normalize_path(path: &str) -> Option<String> {
    let mut url = Url::parse(NORMALIZE_BASE).ok()?;
    url.set_path(path);
    Some(url.path().to_owned())
}

/// A request path after normalisation, with its class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedPath {
    /// Normalised path; this is what gets forwarded and cached
    pub path: String,
    /// Class of the normalised path
    pub class: PathClass,
}

/// How a route entry matches a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMatcher {
    /// Whole path must be equal
    Exact(String),
    /// Path must start with the prefix
    Prefix(String),
}

impl PathMatcher {
    /// Check whether the matcher accepts the path.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(expected) => path == expected,
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

/// A single route table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// Path matcher
    pub matcher: PathMatcher,
    /// Class assigned on match
    pub class: PathClass,
}

impl RouteEntry {
    /// Exact-match entry.
    #[must_use]
    pub fn exact(path: impl Into<String>, class: PathClass) -> Self {
        Self {
            matcher: PathMatcher::Exact(path.into()),
            class,
        }
    }

    /// Prefix-match entry.
    #[must_use]
    pub fn prefix(prefix: impl Into<String>, class: PathClass) -> Self {
        Self {
            matcher: PathMatcher::Prefix(prefix.into()),
            class,
        }
    }
}

/// Ordered route table. The first matching entry wins; no match means
/// [`PathClass::Rejected`].
///
/// Exact entries are placed ahead of the function prefix so the public and
/// service lists carve their paths out of the protected-function space.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Create a table from explicit entries.
    #[must_use]
    pub fn new(entries: Vec<RouteEntry>) -> Self {
        Self { entries }
    }

    /// Build the table from routing settings.
    #[must_use]
    pub fn from_settings(settings: &RoutingSettings) -> Self {
        let mut entries = Vec::with_capacity(
            settings.public_endpoints.len()
                + settings.service_endpoints.len()
                + settings.passthrough_prefixes.len()
                + 1,
        );

        entries.extend(
            settings
                .public_endpoints
                .iter()
                .map(|path| RouteEntry::exact(path.as_str(), PathClass::Public)),
        );
        entries.extend(
            settings
                .service_endpoints
                .iter()
                .map(|path| RouteEntry::exact(path.as_str(), PathClass::ServiceFunction)),
        );
        entries.push(RouteEntry::prefix(FUNCTION_PREFIX, PathClass::ProtectedFunction));
        entries.extend(
            settings
                .passthrough_prefixes
                .iter()
                .map(|prefix| RouteEntry::prefix(prefix.as_str(), PathClass::Passthrough)),
        );

        Self { entries }
    }

    /// Classify a request path.
    #[must_use]
    pub fn classify(&self, path: &str) -> PathClass {
        if has_dot_segment(path) {
            return PathClass::Rejected;
        }

        self.entries
            .iter()
            .find(|entry| entry.matcher.matches(path))
            .map_or(PathClass::Rejected, |entry| entry.class)
    }

    /// Normalise an inbound path and classify the result.
    #[must_use]
    pub fn route(&self, raw: &str) -> RoutedPath {
        match normalize_path(raw) {
            Some(path) => {
                let class = self.classify(&path);
                RoutedPath { path, class }
            }
            None => RoutedPath {
                path: raw.to_owned(),
                class: PathClass::Rejected,
            },
        }
    }

    /// Whether the path is exempt from the gateway secret.
    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        self.classify(path).is_public()
    }

    /// Table entries in evaluation order.
    #[must_use]
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }
}

// Dot segments would let a passthrough prefix reach arbitrary backend paths
// once the URL is normalised. `route` resolves them first; this catches
// callers that classify a raw path.
fn has_dot_segment(path: &str) -> bool {
    path.split('/').any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

/// Routes the gateway serves itself instead of forwarding to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialRoute {
    /// Third-party chat completion proxy
    OpenRouter,
}

impl SpecialRoute {
    /// Look up a special route by exact path.
    #[must_use]
    pub fn lookup(path: &str) -> Option<Self> {
        (path == OPENROUTER_PATH).then_some(Self::OpenRouter)
    }
}
