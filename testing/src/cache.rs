//! In-memory cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stockflow_core::cache::{CacheError, CacheFuture, InventoryCache};

#[derive(Debug, Default)]
struct Inner {
    entries: Mutex<HashMap<String, (String, Option<Duration>)>>,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    sets: AtomicUsize,
}

/// In-memory [`InventoryCache`] with fault injection.
///
/// TTLs are recorded but never enforced.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    inner: Arc<Inner>,
}

impl InMemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw value without counting it as a `set` call.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner
            .entries
            .lock()
            .unwrap()
            .insert(key.into(), (value.into(), None));
    }

    /// Current value under `key`.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.inner
            .entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(value, _)| value.clone())
    }

    /// TTL the value under `key` was written with. `Some(None)` means no expiry.
    #[must_use]
    pub fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        self.inner
            .entries
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, ttl)| *ttl)
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().unwrap().is_empty()
    }

    /// Number of `set` calls that reached the cache, failed ones included.
    #[must_use]
    pub fn set_calls(&self) -> usize {
        self.inner.sets.load(Ordering::SeqCst)
    }

    /// Make `get` fail.
    pub fn fail_get(&self, fail: bool) {
        self.inner.fail_get.store(fail, Ordering::SeqCst);
    }

    /// Make `set` fail.
    pub fn fail_set(&self, fail: bool) {
        self.inner.fail_set.store(fail, Ordering::SeqCst);
    }
}

impl InventoryCache for InMemoryCache {
    fn get(&self, key: &str) -> CacheFuture<'_, Option<String>> {
        let key = key.to_string();
        Box::pin(async move {
            if self.inner.fail_get.load(Ordering::SeqCst) {
                return Err(CacheError::Connection("injected get failure".to_string()));
            }
            Ok(self.value(&key))
        })
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheFuture<'_, ()> {
        let key = key.to_string();
        let value = value.to_string();
        Box::pin(async move {
            self.inner.sets.fetch_add(1, Ordering::SeqCst);
            if self.inner.fail_set.load(Ordering::SeqCst) {
                return Err(CacheError::Command("injected set failure".to_string()));
            }
            self.inner
                .entries
                .lock()
                .unwrap()
                .insert(key, (value, ttl));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_records_value_and_ttl() {
        let cache = InMemoryCache::new();
        cache.set("1:2", "10,8", None).await.unwrap();
        assert_eq!(cache.get("1:2").await.unwrap().as_deref(), Some("10,8"));
        assert_eq!(cache.ttl("1:2"), Some(None));
        assert_eq!(cache.set_calls(), 1);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_errors() {
        let cache = InMemoryCache::new();
        cache.fail_get(true);
        cache.fail_set(true);
        assert!(cache.get("k").await.is_err());
        assert!(cache.set("k", "v", None).await.is_err());
        assert!(cache.is_empty());
    }
}
