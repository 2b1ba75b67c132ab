//! Response caching.
//!
//! A key→(response, expiry) store for idempotent GETs. Entries are evicted
//! lazily: an expired entry is dropped when a read finds it, never by a
//! background sweeper. An explicit [`cleanup_expired`](ResponseCache::cleanup_expired)
//! pass is available for long-lived sessions that want to bound memory.
//!
//! The cache is shared by all batch workers of a session and tolerates
//! concurrent get/set.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use tokio::time::Instant;

use crate::response::Response;

/// A cached response together with its absolute expiry time.
#[derive(Debug, Clone)]
struct CacheEntry {
    response: Response,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Response cache for a session: an in-memory store or a no-op.
///
/// The no-op variant exists so "caching disabled" needs no branching at the
/// call sites: `get` always misses and `set` drops the response.
#[derive(Debug)]
pub enum ResponseCache {
    /// In-memory store with lazy TTL eviction.
    Memory(MemoryCache),
    /// Caching disabled; all operations are no-ops.
    Disabled,
}

impl ResponseCache {
    /// Creates an enabled in-memory cache.
    pub fn memory() -> Self {
        ResponseCache::Memory(MemoryCache::new())
    }

    /// Creates the no-op cache.
    pub fn disabled() -> Self {
        ResponseCache::Disabled
    }

    /// Returns `true` unless this is the no-op variant.
    pub fn is_enabled(&self) -> bool {
        matches!(self, ResponseCache::Memory(_))
    }

    /// Looks up a response, evicting it first if its TTL has passed.
    pub fn get(&self, key: &str) -> Option<Response> {
        match self {
            ResponseCache::Memory(cache) => cache.get(key),
            ResponseCache::Disabled => None,
        }
    }

    /// Stores a response under `key` with the given time-to-live.
    pub fn set(&self, key: impl Into<String>, response: Response, ttl: Duration) {
        if let ResponseCache::Memory(cache) = self {
            cache.set(key.into(), response, ttl);
        }
    }

    /// Drops every entry.
    pub fn clear(&self) {
        if let ResponseCache::Memory(cache) = self {
            cache.clear();
        }
    }

    /// Proactively evicts all entries whose expiry has passed.
    pub fn cleanup_expired(&self) {
        if let ResponseCache::Memory(cache) = self {
            cache.cleanup_expired();
        }
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        match self {
            ResponseCache::Memory(cache) => cache.len(),
            ResponseCache::Disabled => 0,
        }
    }

    /// Returns `true` when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory key→entry store behind a read/write lock.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &str) -> Option<Response> {
        let now = Instant::now();

        let expired = {
            let entries = self
                .entries
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            match entries.get(key) {
                Some(entry) if entry.is_expired(now) => true,
                Some(entry) => return Some(entry.response.clone()),
                None => return None,
            }
        };

        if expired {
            let mut entries = self
                .entries
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            // Re-check under the write lock: a concurrent set may have
            // refreshed the entry since the read.
            if entries.get(key).is_some_and(|e| e.is_expired(now)) {
                entries.remove(key);
            }
        }
        None
    }

    fn set(&self, key: String, response: Response, ttl: Duration) {
        let entry = CacheEntry {
            response,
            expires_at: Instant::now() + ttl,
        };
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key, entry);
    }

    fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    fn cleanup_expired(&self) {
        let now = Instant::now();
        self.entries
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .retain(|_, entry| !entry.is_expired(now));
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}
