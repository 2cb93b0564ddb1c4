//! Response cache for idempotent backend reads.
//!
//! Entries are whole responses keyed by the canonical request URL. Freshness
//! is a fixed window measured from insertion; expired entries are dropped
//! lazily on lookup or when room is needed for a new entry.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use gateway_config::CacheSettings;
use http::{HeaderMap, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Cache store errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Body is larger than the store accepts
    #[error("Response body of {size} bytes exceeds cache limit of {limit} bytes")]
    BodyTooLarge {
        /// Body size
        size: usize,
        /// Configured limit
        limit: usize,
    },
}

/// Result type for cache writes.
pub type CacheResult<T> = Result<T, CacheError>;

/// Build the cache key for a request.
///
/// The key is used verbatim: query parameter order is kept as sent, so
/// `?a=1&b=2` and `?b=2&a=1` are separate entries.
#[must_use]
pub fn cache_key(scheme: &str, host: &str, path_and_query: &str) -> String {
    format!("{scheme}://{host}{path_and_query}")
}

/// A stored backend response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// Backend status
    pub status: StatusCode,
    /// Backend headers, without gateway-added annotations
    pub headers: HeaderMap,
    /// Full body
    pub body: Bytes,
    /// Insertion time
    pub stored_at: Instant,
}

impl CachedResponse {
    /// Capture a response now.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at: Instant::now(),
        }
    }

    /// Time since insertion.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    /// Whether the entry is past its freshness window.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() >= ttl
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the store
    pub hits: u64,
    /// Lookups that found nothing fresh
    pub misses: u64,
    /// Successful writes
    pub stores: u64,
    /// Entries removed to make room
    pub evictions: u64,
    /// Entries currently held, fresh or not
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate as a percentage of lookups.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Storage for cached responses.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a fresh entry.
    async fn get(&self, key: &str) -> Option<CachedResponse>;

    /// Store an entry, replacing any previous value for the key.
    async fn put(&self, key: String, response: CachedResponse) -> CacheResult<()>;

    /// Freshness window applied to entries.
    fn ttl(&self) -> Duration;

    /// Current counters.
    fn stats(&self) -> CacheStats;

    /// Store name for logs.
    fn name(&self) -> &'static str;
}

/// In-process cache store.
#[derive(Debug)]
pub struct MemoryCacheStore {
    entries: DashMap<String, CachedResponse>,
    ttl: Duration,
    max_entries: usize,
    max_body_bytes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    evictions: AtomicU64,
}

impl MemoryCacheStore {
    /// Create a store with the given window and capacity.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
            max_body_bytes: usize::MAX,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stores: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Create a store from cache settings.
    #[must_use]
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.ttl, settings.max_entries).with_max_body_bytes(settings.max_body_bytes)
    }

    /// Refuse bodies larger than `limit`.
    #[must_use]
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Number of entries held, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn make_room(&self) {
        if self.entries.len() < self.max_entries {
            return;
        }

        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(ttl));
        let mut evicted = before.saturating_sub(self.entries.len());

        while self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.stored_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    evicted += 1;
                }
                None => break,
            }
        }

        if evicted > 0 {
            self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(evicted, "Evicted cache entries");
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Option<CachedResponse> {
        let found = self.entries.get(key).map(|entry| entry.value().clone());

        match found {
            Some(entry) if !entry.is_expired(self.ttl) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(key, age_ms = entry.age().as_millis() as u64, "Cache entry fresh");
                Some(entry)
            }
            Some(_) => {
                let ttl = self.ttl;
                self.entries.remove_if(key, |_, entry| entry.is_expired(ttl));
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(key, "Cache entry expired");
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn put(&self, key: String, response: CachedResponse) -> CacheResult<()> {
        if response.body.len() > self.max_body_bytes {
            return Err(CacheError::BodyTooLarge {
                size: response.body.len(),
                limit: self.max_body_bytes,
            });
        }

        if !self.entries.contains_key(&key) {
            self.make_room();
        }

        self.entries.insert(key, response);
        self.stores.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header;

    fn response(body: &'static str) -> CachedResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        CachedResponse::new(StatusCode::OK, headers, Bytes::from_static(body.as_bytes()))
    }

    #[test]
    fn test_cache_key_is_verbatim() {
        assert_eq!(
            cache_key("https", "gw.touchbase.site", "/rest/v1/contacts?id=1"),
            "https://gw.touchbase.site/rest/v1/contacts?id=1"
        );
        assert_ne!(
            cache_key("https", "h", "/rest/v1/c?a=1&b=2"),
            cache_key("https", "h", "/rest/v1/c?b=2&a=1")
        );
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryCacheStore::new(Duration::from_secs(60), 10);
        store.put("k".to_string(), response("{\"a\":1}")).await.unwrap();

        let hit = store.get("k").await.unwrap();
        assert_eq!(hit.status, StatusCode::OK);
        assert_eq!(hit.body, Bytes::from_static(b"{\"a\":1}"));
        assert_eq!(hit.headers[header::CONTENT_TYPE], "application/json");

        assert!(store.get("other").await.is_none());
        let stats = store.stats();
        assert_eq!((stats.hits, stats.misses, stats.stores), (1, 1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_window() {
        let store = MemoryCacheStore::new(Duration::from_secs(60), 10);
        store.put("k".to_string(), response("x")).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.get("k").await.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("k").await.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacement_restarts_window() {
        let store = MemoryCacheStore::new(Duration::from_secs(60), 10);
        store.put("k".to_string(), response("old")).await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        store.put("k".to_string(), response("new")).await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        let hit = store.get("k").await.unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"new"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_expired_first_then_oldest() {
        let store = MemoryCacheStore::new(Duration::from_secs(60), 2);

        store.put("a".to_string(), response("a")).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        store.put("b".to_string(), response("b")).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        store.put("c".to_string(), response("c")).await.unwrap();

        // "a" was expired and swept; "b" and "c" both fit.
        assert!(store.get("b").await.is_some());
        assert!(store.get("c").await.is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        store.put("d".to_string(), response("d")).await.unwrap();

        assert!(store.get("b").await.is_none());
        assert!(store.get("c").await.is_some());
        assert!(store.get("d").await.is_some());
        assert_eq!(store.stats().evictions, 2);
    }

    #[tokio::test]
    async fn test_oversized_body_is_refused() {
        let store = MemoryCacheStore::new(Duration::from_secs(60), 10).with_max_body_bytes(4);
        let result = store.put("k".to_string(), response("too long")).await;

        assert!(matches!(result, Err(CacheError::BodyTooLarge { size: 8, limit: 4 })));
        assert!(store.get("k").await.is_none());
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 75.0).abs() < f64::EPSILON);
        assert!(CacheStats::default().hit_rate().abs() < f64::EPSILON);
    }
}
