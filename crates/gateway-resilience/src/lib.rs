//! # Gateway Resilience
//!
//! Backend load shedding for the Touchbase edge gateway:
//! - Response cache store abstraction
//! - In-memory store with a fixed freshness window and bounded capacity
//! - Cache key construction and hit/miss accounting

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;

// Re-export main types
pub use cache::{
    cache_key, CacheError, CacheResult, CacheStats, CacheStore, CachedResponse, MemoryCacheStore,
};
