//! A small per-session cache tracking which objects a WebSocket client is
//! watching, grounded on the original exec bridge's `Cache` type.
use std::collections::HashMap;

use tokio::sync::Mutex;

/// Tracks the latest known value of every object a session cares about.
///
/// In `loose` mode every key is considered watched (used for `watch=*`);
/// otherwise only keys explicitly [`WatchCache::set`] are tracked, and
/// [`WatchCache::check`] rejects everything else.
pub struct WatchCache<T> {
    loose: bool,
    buf: Mutex<HashMap<String, T>>,
}

impl<T: Clone> WatchCache<T> {
    /// Build an empty cache. `loose` watches every key, not just seeded ones.
    pub fn new(loose: bool) -> Self {
        WatchCache {
            loose,
            buf: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `key` is of interest to this session.
    pub async fn check(&self, key: &str) -> bool {
        if self.loose {
            return true;
        }
        self.buf.lock().await.contains_key(key)
    }

    /// Record the latest value for `key`.
    pub async fn set(&self, key: impl Into<String>, value: T) {
        self.buf.lock().await.insert(key.into(), value);
    }

    /// Look up the latest value for `key`, if tracked.
    pub async fn get(&self, key: &str) -> Option<T> {
        self.buf.lock().await.get(key).cloned()
    }

    /// Remove `key`, returning its last known value if any.
    pub async fn pop(&self, key: &str) -> Option<T> {
        self.buf.lock().await.remove(key)
    }

    /// Snapshot every currently tracked value.
    pub async fn flush(&self) -> Vec<T> {
        self.buf.lock().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn strict_cache_rejects_unseeded_keys() {
        let cache: WatchCache<i32> = WatchCache::new(false);
        cache.set("a", 1).await;
        assert!(cache.check("a").await);
        assert!(!cache.check("b").await);
    }

    #[tokio::test]
    async fn loose_cache_accepts_everything() {
        let cache: WatchCache<i32> = WatchCache::new(true);
        assert!(cache.check("anything").await);
    }

    #[tokio::test]
    async fn pop_removes_and_returns() {
        let cache: WatchCache<i32> = WatchCache::new(false);
        cache.set("a", 42).await;
        assert_eq!(cache.pop("a").await, Some(42));
        assert_eq!(cache.get("a").await, None);
    }
}
