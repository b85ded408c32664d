//! Cache-aside access to inventory values.
//!
//! [`CacheAside`] turns the raw string cache into an advisory view of
//! `(stock, threshold)` pairs. Every cache failure degrades to a miss on read
//! and to a logged no-op on write, so the cache can never fail an update.
//!
//! # Staleness
//!
//! Entries never expire and are written without compare-and-set. Two
//! partitions updating the same pair may leave the cache holding whichever
//! value was written last; the store remains authoritative.

use crate::metrics::PipelineMetrics;
use std::sync::Arc;
use std::time::Duration;
use stockflow_core::cache::InventoryCache;
use stockflow_core::inventory::{CachedInventory, InventoryKey};
use tracing::{debug, warn};

/// Advisory cache of inventory values.
#[derive(Clone)]
pub struct CacheAside {
    cache: Arc<dyn InventoryCache>,
    ttl: Option<Duration>,
}

impl CacheAside {
    /// Wrap a cache. Entries are written without expiry.
    #[must_use]
    pub fn new(cache: Arc<dyn InventoryCache>) -> Self {
        Self { cache, ttl: None }
    }

    /// Write entries with the given expiry instead.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Cached view for `key`.
    ///
    /// Returns `None` when the entry is absent, does not parse as exactly two
    /// integers, or the cache tier fails.
    pub async fn get(&self, key: &InventoryKey) -> Option<CachedInventory> {
        let cache_key = key.cache_key();
        let cached = match self.cache.get(&cache_key).await {
            Ok(Some(value)) => {
                let parsed = CachedInventory::parse(&value);
                if parsed.is_none() {
                    warn!(key = %cache_key, value = %value, "Ignoring malformed cache entry");
                }
                parsed
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key = %cache_key, error = %e, "Cache read failed, falling back to store");
                None
            }
        };
        if cached.is_none() {
            debug!(key = %cache_key, "Cache miss");
            PipelineMetrics::record_cache_miss();
        }
        cached
    }

    /// Store `(stock, threshold)` for `key`, logging and swallowing failures.
    pub async fn set(&self, key: &InventoryKey, stock_level: i32, alert_threshold: i32) {
        let cache_key = key.cache_key();
        let value = CachedInventory::new(stock_level, alert_threshold).encode();
        if let Err(e) = self.cache.set(&cache_key, &value, self.ttl).await {
            warn!(key = %cache_key, error = %e, "Cache write failed");
        }
    }
}

impl std::fmt::Debug for CacheAside {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAside").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}
