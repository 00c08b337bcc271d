//! In-process compute-result cache.
//!
//! Sits between call-data decoding and dispatch: identical `(method, params)`
//! pairs within the TTL reuse the previous result instead of re-running the
//! function. Entries are evicted lazily on read and by the same periodic
//! sweep that maintains the rate limiter. Nothing is persisted or shared
//! across processes, and envelopes themselves are never cached, only the
//! raw compute result.

use dashmap::DashMap;
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::registry::JsonMap;

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

pub struct ComputeCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl ComputeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let hit = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => None,
            None => return None,
        };
        if hit.is_none() {
            self.entries.remove(key);
        }
        hit
    }

    pub fn insert(&self, key: String, value: Value) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Cache key over the dispatch inputs. Params serialize with sorted keys, so
/// equal maps always produce equal keys.
pub fn cache_key(method: &str, params: &JsonMap) -> String {
    let params_json = serde_json::to_string(params).unwrap_or_default();
    format!("{method}:{params_json}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hit_within_ttl() {
        let cache = ComputeCache::new(Duration::from_secs(30));
        cache.insert("k".to_string(), json!({"price": 1}));
        assert_eq!(cache.get("k").unwrap()["price"], 1);
    }

    #[test]
    fn test_expired_entry_misses_and_is_evicted() {
        let cache = ComputeCache::new(Duration::from_millis(0));
        cache.insert("k".to_string(), json!(1));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_sweep_removes_expired() {
        let cache = ComputeCache::new(Duration::from_millis(0));
        cache.insert("a".to_string(), json!(1));
        cache.insert("b".to_string(), json!(2));
        cache.sweep();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_cache_key_is_order_insensitive() {
        let mut a = JsonMap::new();
        a.insert("x".to_string(), json!(1));
        a.insert("y".to_string(), json!(2));
        let mut b = JsonMap::new();
        b.insert("y".to_string(), json!(2));
        b.insert("x".to_string(), json!(1));
        assert_eq!(cache_key("m", &a), cache_key("m", &b));
    }

    #[test]
    fn test_cache_key_separates_methods() {
        let params = JsonMap::new();
        assert_ne!(cache_key("a", &params), cache_key("b", &params));
    }
}
