// In-memory cache for upstream responses
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Cached upstream payload with its creation time
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Value,
    pub created_at: Instant,
}

/// Response cache keyed by operation + parameters ("history-bitcoin-30").
///
/// Entries are only usable while `now - created_at < ttl`. Expired entries are
/// dropped lazily when their key is looked up; nothing sweeps the map.
#[derive(Debug)]
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    capacity: usize,
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a fresh payload. An expired entry is removed and reported as a miss.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) if now.saturating_duration_since(entry.created_at) < self.ttl => {
                return Some(entry.payload.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove(key);
            debug!(cache_key = key, "Cache entry expired, evicted");
        }

        None
    }

    /// Store a payload. A full cache drops its oldest entry first.
    pub fn insert(&mut self, key: impl Into<String>, payload: Value, now: Instant) {
        let key = key.into();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                self.entries.remove(&oldest);
                debug!(cache_key = %oldest, "Cache full, evicted oldest entry");
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                payload,
                created_at: now,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached keys in sorted order (expired-but-unvisited keys included)
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}
