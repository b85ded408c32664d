//! Key-value cache tier in front of the inventory store.
//!
//! The cache is a weakly-consistent accelerator: it may be stale or empty, and
//! its failures must never fail a write. Callers reach it through
//! `CacheAside` in `stockflow-runtime`, which absorbs every [`CacheError`].
//!
//! # Implementations
//!
//! - `RedisInventoryCache` (in `stockflow-redis`)
//! - `InMemoryCache` (in `stockflow-testing`)

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by the cache tier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Cache tier unreachable.
    #[error("Cache connection failed: {0}")]
    Connection(String),

    /// Cache command rejected or failed.
    #[error("Cache command failed: {0}")]
    Command(String),
}

/// Future returned by cache operations.
pub type CacheFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CacheError>> + Send + 'a>>;

/// String key-value cache.
pub trait InventoryCache: Send + Sync {
    /// Get the value under `key`, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the cache tier fails.
    fn get(&self, key: &str) -> CacheFuture<'_, Option<String>>;

    /// Set `key` to `value`. `ttl: None` means the entry never expires.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the cache tier fails.
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheFuture<'_, ()>;
}
