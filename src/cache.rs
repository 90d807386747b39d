//! Short-lived keyed cache of decoded device documents.
//!
//! Expiry is passive: entries are checked against their deadline on read and
//! dropped there. There is no background eviction task; [`StatusCache::purge_expired`]
//! can be called to reclaim memory for targets that are no longer polled.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Document a cache entry was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Device configuration (component enumeration).
    Config,
    /// Combined status document serving several readings (Gen1 `/status`).
    Status,
}

/// Cache key scoped to a target address and a document kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub address: String,
    pub document: DocumentKind,
}

impl CacheKey {
    pub fn new(address: impl Into<String>, document: DocumentKind) -> Self {
        Self {
            address: address.into(),
            document,
        }
    }

    /// Key of the configuration document of `address`.
    pub fn config(address: impl Into<String>) -> Self {
        Self::new(address, DocumentKind::Config)
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Thread-safe TTL cache shared by concurrent collection passes.
#[derive(Debug)]
pub struct StatusCache<V> {
    entries: Mutex<HashMap<CacheKey, Entry<V>>>,
}

impl<V> Default for StatusCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Clone> StatusCache<V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of the live value for `key`.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `value` under `key` for `ttl`. A zero TTL stores nothing.
    pub fn set(&self, key: CacheKey, value: V, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().insert(key, entry);
    }

    /// Drop the entry for `key`, if any.
    pub fn invalidate(&self, key: &CacheKey) {
        self.entries.lock().remove(key);
    }

    /// Drop all expired entries and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
