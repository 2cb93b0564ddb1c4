//! Backend forwarding and response relay.

use axum::body::{Body, HttpBody};
use axum::response::Response;
use bytes::{Bytes, BytesMut};
use futures::Stream;
use gateway_config::BackendConfig;
use gateway_core::headers::{is_hop_by_hop, X_CACHE};
use gateway_core::{GatewayError, GatewayResult};
use gateway_resilience::{CacheStore, CachedResponse};
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use http_body_util::LengthLimitError;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use tracing::{debug, warn};
use url::Url;

use crate::error::ServerError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sends requests to the backend data service.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    base: Url,
}

impl Forwarder {
    /// Create a forwarder for a backend base URL.
    #[must_use]
    pub fn new(client: reqwest::Client, base: Url) -> Self {
        Self { client, base }
    }

    /// Build a forwarder and its HTTP client from backend settings.
    pub fn from_config(config: &BackendConfig) -> Result<Self, ServerError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self::new(client, config.base_url()?))
    }

    /// Backend URL for a normalised request path and query.
    ///
    /// Fails if the serialised URL path is not exactly the base path followed
    /// by `path`, so the backend never sees a path other than the one that was
    /// classified.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> GatewayResult<Url> {
        let expected = format!("{}{}", self.base.path().trim_end_matches('/'), path);
        let mut url = self.base.clone();
        url.set_path(&expected);
        url.set_query(query);

        if url.path() != expected {
            warn!(path, resolved = url.path(), "Backend path differs from classified path");
            return Err(GatewayError::RouteNotFound(path.to_owned()));
        }
        Ok(url)
    }

    /// Send a request to the backend.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        mut headers: HeaderMap,
        body: OutboundBody,
    ) -> GatewayResult<reqwest::Response> {
        let url = self.target_url(path, query)?;
        debug!(method = %method, path = url.path(), streamed = body.body.is_some(), "Forwarding to backend");

        let OutboundBody {
            body,
            length,
            limit,
            overflow,
        } = body;
        if let Some(length) = length.filter(|_| body.is_some()) {
            headers
                .entry(header::CONTENT_LENGTH)
                .or_insert_with(|| HeaderValue::from(length));
        }
        let mut request = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        request.send().await.map_err(|e| {
            if overflow.load(Ordering::Acquire) {
                GatewayError::PayloadTooLarge { limit }
            } else {
                GatewayError::upstream(describe_transport_error(&e))
            }
        })
    }
}

/// Inbound request body streamed to the backend under a size limit.
pub struct OutboundBody {
    body: Option<reqwest::Body>,
    // Known size, so the body is not sent chunked.
    length: Option<u64>,
    limit: usize,
    overflow: Arc<AtomicBool>,
}

impl OutboundBody {
    /// Wrap an inbound body.
    ///
    /// Bodies whose declared or known size is over `limit` are rejected before
    /// anything is sent. Anything else is streamed and cut off once it passes
    /// `limit`, which fails the backend call with
    /// [`GatewayError::PayloadTooLarge`].
    pub fn new(headers: &HeaderMap, body: Body, limit: usize) -> GatewayResult<Self> {
        let declared = declared_length(headers);
        if declared.is_some_and(|len| len > limit as u64) {
            return Err(GatewayError::PayloadTooLarge { limit });
        }

        let hint = body.size_hint();
        if hint.lower() > limit as u64 {
            return Err(GatewayError::PayloadTooLarge { limit });
        }

        let overflow = Arc::new(AtomicBool::new(false));
        let body = if hint.exact() == Some(0) {
            None
        } else {
            let stream = LimitedStream::new(body.into_data_stream(), limit, overflow.clone());
            Some(reqwest::Body::wrap_stream(stream))
        };

        Ok(Self {
            body,
            length: declared.or_else(|| hint.exact()),
            limit,
            overflow,
        })
    }
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

pin_project! {
    /// Passes an inbound body through until it exceeds the limit.
    struct LimitedStream<S> {
        #[pin]
        inner: S,
        seen: usize,
        limit: usize,
        overflow: Arc<AtomicBool>,
    }
}

impl<S> LimitedStream<S> {
    fn new(inner: S, limit: usize, overflow: Arc<AtomicBool>) -> Self {
        Self {
            inner,
            seen: 0,
            limit,
            overflow,
        }
    }
}

impl<S> Stream for LimitedStream<S>
where
    S: Stream<Item = Result<Bytes, axum::Error>>,
{
    type Item = Result<Bytes, BoxError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match ready!(this.inner.poll_next(cx)) {
            Some(Ok(chunk)) => {
                *this.seen += chunk.len();
                if *this.seen > *this.limit {
                    this.overflow.store(true, Ordering::Release);
                    return Poll::Ready(Some(Err(BoxError::from(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        "request body exceeds limit",
                    )))));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => Poll::Ready(Some(Err(BoxError::from(e)))),
            None => Poll::Ready(None),
        }
    }
}

pub(crate) fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    }
}

/// Read an inbound body into memory, up to `limit` bytes.
pub async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> GatewayResult<Bytes> {
    if declared_length(headers).is_some_and(|len| len > limit as u64) {
        return Err(GatewayError::PayloadTooLarge { limit });
    }

    axum::body::to_bytes(body, limit).await.map_err(|e| {
        if is_length_limit(&e) {
            GatewayError::PayloadTooLarge { limit }
        } else {
            GatewayError::internal(format!("failed to read request body: {e}"))
        }
    })
}

fn is_length_limit(error: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(err) = source {
        if err.is::<LengthLimitError>() {
            return true;
        }
        source = err.source();
    }
    false
}

/// Response headers safe to relay to the caller.
#[must_use]
pub fn response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        if !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

/// Where a relayed response should be stored once its body completes.
pub struct CacheWrite {
    /// Target store
    pub store: Arc<dyn CacheStore>,
    /// Cache key
    pub key: String,
    /// Largest body worth storing
    pub max_body_bytes: usize,
}

/// Build the caller's response from a backend response, streaming the body.
///
/// With a cache target and a 200 status the response is annotated as a miss
/// and the body is stored once all of it has passed through.
pub fn relay(upstream: reqwest::Response, cache: Option<CacheWrite>) -> Response {
    let status = upstream.status();
    let headers = response_headers(upstream.headers());

    let cache = cache.filter(|write| {
        if status != StatusCode::OK {
            return false;
        }
        match upstream.content_length() {
            Some(len) if len > write.max_body_bytes as u64 => {
                debug!(len, limit = write.max_body_bytes, "Response too large to cache");
                false
            }
            _ => true,
        }
    });

    let expected = upstream.content_length();
    let stream = upstream.bytes_stream();
    let Some(write) = cache else {
        return build_response(status, headers, Body::from_stream(stream));
    };

    let ttl = write.store.ttl();
    let pending = PendingWrite {
        store: write.store,
        key: write.key,
        status,
        headers: headers.clone(),
        limit: write.max_body_bytes,
        expected,
    };
    let body = if expected == Some(0) {
        pending.commit(Bytes::new());
        Body::from_stream(stream)
    } else {
        Body::from_stream(CacheTee::new(stream, pending))
    };
    let mut response = build_response(status, headers, body);

    let response_headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&format!("s-maxage={}", ttl.as_secs())) {
        response_headers.insert(header::CACHE_CONTROL, value);
    }
    response_headers.insert(X_CACHE, HeaderValue::from_static("MISS"));
    response
}

/// Build the caller's response from a cache entry.
#[must_use]
pub fn cached_response(hit: CachedResponse) -> Response {
    let mut response = build_response(hit.status, hit.headers, Body::from(hit.body));
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static("HIT"));
    response
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

struct PendingWrite {
    store: Arc<dyn CacheStore>,
    key: String,
    status: StatusCode,
    headers: HeaderMap,
    limit: usize,
    // Upstream Content-Length. The server stops polling a body once this many
    // bytes are written, so end of stream may never be observed.
    expected: Option<u64>,
}

impl PendingWrite {
    fn commit(self, body: Bytes) {
        tokio::spawn(async move {
            let response = CachedResponse::new(self.status, self.headers, body);
            match self.store.put(self.key, response).await {
                Ok(()) => debug!(store = self.store.name(), "Stored response in cache"),
                Err(e) => warn!(store = self.store.name(), error = %e, "Cache write failed"),
            }
        });
    }
}

pin_project! {
    /// Passes a body stream through while buffering a copy for the cache.
    ///
    /// The copy is stored once the declared length has been seen, or at end of
    /// stream for bodies without one. It is dropped if the body errors or grows
    /// past the limit.
    struct CacheTee<S> {
        #[pin]
        inner: S,
        buffer: BytesMut,
        pending: Option<PendingWrite>,
    }
}

impl<S> CacheTee<S> {
    fn new(inner: S, pending: PendingWrite) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
            pending: Some(pending),
        }
    }
}

impl<S, E> Stream for CacheTee<S>
where
    S: Stream<Item = Result<Bytes, E>>,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match ready!(this.inner.poll_next(cx)) {
            Some(Ok(chunk)) => {
                if let Some(limit) = this.pending.as_ref().map(|p| p.limit) {
                    if this.buffer.len() + chunk.len() > limit {
                        debug!(limit, "Response outgrew cache limit");
                        *this.pending = None;
                        *this.buffer = BytesMut::new();
                    } else {
                        this.buffer.extend_from_slice(&chunk);
                    }
                }
                let complete = this
                    .pending
                    .as_ref()
                    .and_then(|p| p.expected)
                    .is_some_and(|expected| this.buffer.len() as u64 >= expected);
                if complete {
                    if let Some(pending) = this.pending.take() {
                        pending.commit(std::mem::take(this.buffer).freeze());
                    }
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                *this.pending = None;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                if let Some(pending) = this.pending.take() {
                    pending.commit(std::mem::take(this.buffer).freeze());
                }
                Poll::Ready(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};
    use gateway_resilience::MemoryCacheStore;
    use std::time::Duration;

    fn forwarder(base: &str) -> Forwarder {
        Forwarder::new(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn test_target_url_keeps_path_and_query() {
        let forwarder = forwarder("https://project.supabase.co");
        let url = forwarder
            .target_url("/rest/v1/contacts", Some("select=*&id=eq.1"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://project.supabase.co/rest/v1/contacts?select=*&id=eq.1"
        );
    }

    #[test]
    fn test_target_url_with_base_path() {
        let forwarder = forwarder("http://127.0.0.1:5555/backend/");
        let url = forwarder.target_url("/auth/v1/token", None).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:5555/backend/auth/v1/token");
    }

    #[test]
    fn test_target_url_refuses_paths_that_resolve_elsewhere() {
        let forwarder = forwarder("https://project.supabase.co");
        for path in [
            "/rest/v1/../functions/v1/export-data",
            "/rest/v1/%2e%2e/%2e%2e/functions/v1/export-data",
            "/rest/v1/%2E%2E/admin",
        ] {
            let err = forwarder.target_url(path, None).unwrap_err();
            assert!(matches!(err, GatewayError::RouteNotFound(_)), "{path}");
        }
    }

    #[test]
    fn test_outbound_body_rejects_known_oversize() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("100"));
        assert!(matches!(
            OutboundBody::new(&headers, Body::empty(), 10),
            Err(GatewayError::PayloadTooLarge { limit: 10 })
        ));

        assert!(matches!(
            OutboundBody::new(&HeaderMap::new(), Body::from(vec![0u8; 64]), 16),
            Err(GatewayError::PayloadTooLarge { limit: 16 })
        ));
    }

    #[test]
    fn test_outbound_body_skips_empty_body() {
        let body = OutboundBody::new(&HeaderMap::new(), Body::empty(), 16).unwrap();
        assert!(body.body.is_none());

        let body = OutboundBody::new(&HeaderMap::new(), Body::from("hello"), 16).unwrap();
        assert!(body.body.is_some());
        assert_eq!(body.length, Some(5));
    }

    #[tokio::test]
    async fn test_limited_stream_cuts_off_and_flags_overflow() {
        let overflow = Arc::new(AtomicBool::new(false));
        let chunks = stream::iter(vec![
            Ok::<_, axum::Error>(Bytes::from_static(b"abcd")),
            Ok(Bytes::from_static(b"efgh")),
        ]);

        let items: Vec<_> = LimitedStream::new(chunks, 6, overflow.clone()).collect().await;
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
        assert!(overflow.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_limited_stream_passes_body_within_limit() {
        let overflow = Arc::new(AtomicBool::new(false));
        let chunks = stream::iter(vec![Ok::<_, axum::Error>(Bytes::from_static(b"abcd"))]);

        let items: Vec<_> = LimitedStream::new(chunks, 4, overflow.clone()).collect().await;
        assert_eq!(items.len(), 1);
        assert!(!overflow.load(Ordering::Acquire));
    }

    #[test]
    fn test_response_headers_drop_hop_by_hop() {
        let mut upstream = HeaderMap::new();
        upstream.insert(header::CONNECTION, HeaderValue::from_static("close"));
        upstream.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        upstream.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let headers = response_headers(&upstream);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn test_read_body_limit() {
        let ok = read_body(&HeaderMap::new(), Body::from("hello"), 5).await.unwrap();
        assert_eq!(ok, Bytes::from_static(b"hello"));

        let err = read_body(&HeaderMap::new(), Body::from("hello!"), 5).await;
        assert!(matches!(err, Err(GatewayError::PayloadTooLarge { limit: 5 })));
    }

    #[tokio::test]
    async fn test_read_body_rejects_declared_length() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("100"));
        let err = read_body(&headers, Body::empty(), 10).await;
        assert!(matches!(err, Err(GatewayError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_cached_response_is_marked_hit() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let response = cached_response(CachedResponse::new(
            StatusCode::OK,
            headers,
            Bytes::from_static(b"[]"),
        ));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[X_CACHE], "HIT");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    fn pending(store: &Arc<MemoryCacheStore>, limit: usize) -> PendingWrite {
        PendingWrite {
            store: store.clone(),
            key: "https://gw/rest/v1/x".to_string(),
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            limit,
            expected: None,
        }
    }

    async fn wait_for_entry(store: &MemoryCacheStore) -> Option<CachedResponse> {
        for _ in 0..50 {
            if let Some(hit) = store.get("https://gw/rest/v1/x").await {
                return Some(hit);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }

    #[tokio::test]
    async fn test_tee_stores_complete_body() {
        let store = Arc::new(MemoryCacheStore::new(Duration::from_secs(60), 10));
        let chunks = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"cd")),
        ]);

        let relayed: Vec<_> = CacheTee::new(chunks, pending(&store, 1024)).collect().await;
        assert_eq!(relayed.len(), 2);

        let hit = wait_for_entry(&store).await.unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"abcd"));
    }

    #[tokio::test]
    async fn test_tee_stores_once_declared_length_is_read() {
        let store = Arc::new(MemoryCacheStore::new(Duration::from_secs(60), 10));
        // The stream never ends, as when the server stops polling after
        // Content-Length bytes.
        let chunks = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"cd")),
        ])
        .chain(stream::pending());
        let mut write = pending(&store, 1024);
        write.expected = Some(4);

        let mut tee = Box::pin(CacheTee::new(chunks, write));
        assert_eq!(tee.next().await.unwrap().unwrap(), Bytes::from_static(b"ab"));
        assert_eq!(tee.next().await.unwrap().unwrap(), Bytes::from_static(b"cd"));

        let hit = wait_for_entry(&store).await.unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"abcd"));
        drop(tee);
    }

    #[tokio::test]
    async fn test_tee_skips_oversized_body() {
        let store = Arc::new(MemoryCacheStore::new(Duration::from_secs(60), 10));
        let chunks = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"def")),
        ]);

        let relayed: Vec<_> = CacheTee::new(chunks, pending(&store, 4)).collect().await;
        assert_eq!(relayed.len(), 2);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_tee_skips_failed_body() {
        let store = Arc::new(MemoryCacheStore::new(Duration::from_secs(60), 10));
        let chunks = stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(std::io::Error::other("reset")),
        ]);

        let relayed: Vec<_> = CacheTee::new(chunks, pending(&store, 1024)).collect().await;
        assert!(relayed[1].is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.is_empty());
    }
}
