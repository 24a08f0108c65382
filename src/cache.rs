//! Time-bounded key-value cache.
//!
//! # Responsibilities
//! - Hold per-client window counters and alert markers with a per-entry TTL
//! - Never hand out an entry past its deadline
//! - Physically evict expired entries on demand (the admission sweeper
//!   drives this periodically)

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A thread-safe map whose entries expire individually.
///
/// Reads past an entry's deadline behave as a miss even before the entry is
/// swept away. Cloning is cheap and shares the underlying map.
#[derive(Clone)]
pub struct TtlCache<V> {
    inner: Arc<DashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Insert or replace `key`, expiring `ttl` from now.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.inner.insert(key.to_string(), entry);
    }

    /// Look up `key`, returning the value and its expiry instant.
    ///
    /// Expired entries read as `None`; their removal is left to
    /// [`TtlCache::purge_expired`].
    pub fn get(&self, key: &str) -> Option<(V, Instant)> {
        let entry = self.inner.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some((entry.value.clone(), entry.expires_at))
    }

    /// Drop every entry whose deadline has passed.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.inner.retain(|_, entry| entry.expires_at > now);
    }

    /// Number of entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
