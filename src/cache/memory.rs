//! In-process cache backed by a concurrent hash map.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use super::{CacheError, CacheStore};

/// Stores between two automatic sweeps of expired entries.
pub const PURGE_INTERVAL: u64 = 256;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    /// `None` when the TTL overflowed the clock.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Hit/miss/store counters for a [`MemoryCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub evictions: u64,
}

/// A TTL-aware in-memory [`CacheStore`].
///
/// Expired entries are evicted lazily when they are read, and swept every
/// [`PURGE_INTERVAL`] stores or on demand through
/// [`purge_expired`](Self::purge_expired).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rendercache::cache::{CacheStore, MemoryCache};
///
/// let cache = MemoryCache::new();
/// cache.save("k", "<p>hi</p>", Duration::from_secs(300)).unwrap();
/// assert_eq!(cache.fetch("k").unwrap().as_deref(), Some("<p>hi</p>"));
/// assert_eq!(cache.stats().hits, 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    evictions: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until they are evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed, "purged expired cache entries");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl CacheStore for MemoryCache {
    fn fetch(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();

        // The read guard must be released before `remove` touches the same shard.
        let found = self.entries.get(key).map(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.value.clone())
            }
        });

        match found {
            Some(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            Some(None) => {
                if self
                    .entries
                    .remove_if(key, |_, entry| entry.is_expired(now))
                    .is_some()
                {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    fn save(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value: value.to_owned(),
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.insert(key.to_owned(), entry);
        let stores = self.stores.fetch_add(1, Ordering::Relaxed) + 1;
        if stores % PURGE_INTERVAL == 0 {
            self.purge_expired();
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }
}
