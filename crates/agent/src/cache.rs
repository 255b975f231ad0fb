//! LRU + TTL cache
//!
//! Bounded-size, per-entry TTL, strict least-recently-used eviction.
//! Expired entries are evicted lazily on `get`; `cleanup_expired` is an
//! explicit maintenance sweep, not a background task. Two stock
//! instances: responses are expensive to regenerate but go stale fast,
//! search results are cheap to recompute but reusable for longer.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted: Instant,
    last_access: Instant,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    hits: u64,
    misses: u64,
}

/// Shared cache handle. Interior mutex so one instance can serve every
/// concurrent request.
pub struct Cache<V> {
    inner: Mutex<Inner<V>>,
    max_entries: usize,
    ttl: Duration,
}

impl<V: Clone> Cache<V> {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
            max_entries,
            ttl,
        }
    }

    /// Stock instance for generated responses: 500 entries, 30 minutes
    pub fn response_cache() -> Self {
        Self::new(500, Duration::from_secs(30 * 60))
    }

    /// Stock instance for retrieval results: 200 entries, 60 minutes
    pub fn search_cache() -> Self {
        Self::new(200, Duration::from_secs(60 * 60))
    }

    /// Stable key over the normalized query plus sorted non-null params
    pub fn make_key(query: &str, params: &[(&str, Option<&str>)]) -> String {
        let normalized = query.trim().to_lowercase();
        let normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

        let mut present: Vec<(&str, &str)> = params
            .iter()
            .filter_map(|(name, value)| value.map(|v| (*name, v)))
            .collect();
        present.sort_unstable();

        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        normalized.hash(&mut hasher);
        present.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    /// Look up a key. An expired entry counts as a miss and is evicted.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        let expired = match inner.entries.get(key) {
            Some(entry) => entry.inserted.elapsed() > self.ttl,
            None => {
                inner.misses += 1;
                return None;
            }
        };
        if expired {
            inner.entries.remove(key);
            inner.misses += 1;
            return None;
        }
        inner.hits += 1;
        let entry = inner.entries.get_mut(key)?;
        entry.last_access = Instant::now();
        Some(entry.value.clone())
    }

    /// Insert a value, evicting the least-recently-accessed entry when
    /// at capacity
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            let lru = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(k, _)| k.clone());
            if let Some(lru_key) = lru {
                inner.entries.remove(&lru_key);
            }
        }

        inner.entries.insert(
            key,
            Entry {
                value,
                inserted: now,
                last_access: now,
            },
        );
    }

    /// Drop every expired entry, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        let ttl = self.ttl;
        inner.entries.retain(|_, entry| entry.inserted.elapsed() <= ttl);
        before - inner.entries.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit-rate summary for log lines
    pub fn stats(&self) -> String {
        let inner = self.inner.lock();
        let total = inner.hits + inner.misses;
        let rate = if total == 0 {
            0.0
        } else {
            inner.hits as f64 / total as f64 * 100.0
        };
        format!(
            "hits={} misses={} hit_rate={:.1}% entries={}",
            inner.hits,
            inner.misses,
            rate,
            inner.entries.len()
        )
    }
}
