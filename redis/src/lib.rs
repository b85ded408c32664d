//! Redis cache for Stockflow.
//!
//! Implements the [`InventoryCache`] capability from `stockflow-core` on a
//! multiplexed [`ConnectionManager`], which reconnects on its own after
//! failures. Values are plain strings; callers own the encoding.
//!
//! # Example
//!
//! ```no_run
//! use stockflow_redis::RedisInventoryCache;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = RedisInventoryCache::new("redis://127.0.0.1:6379").await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use stockflow_core::cache::{CacheError, CacheFuture, InventoryCache};

/// Redis-backed [`InventoryCache`].
#[derive(Clone)]
pub struct RedisInventoryCache {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisInventoryCache {
    /// Connect to Redis.
    ///
    /// `rediss://` URLs use TLS without certificate verification unless the
    /// URL already carries a fragment.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Connection`] if the URL is invalid or the server
    /// cannot be reached.
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(connection_url(redis_url))
            .map_err(|e| CacheError::Connection(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::Connection(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!("Connected to Redis");
        Ok(Self { conn_manager })
    }
}

fn connection_url(redis_url: &str) -> String {
    if redis_url.starts_with("rediss://") && !redis_url.contains('#') {
        format!("{redis_url}#insecure")
    } else {
        redis_url.to_string()
    }
}

impl InventoryCache for RedisInventoryCache {
    fn get(&self, key: &str) -> CacheFuture<'_, Option<String>> {
        let mut conn = self.conn_manager.clone();
        let key = key.to_string();
        Box::pin(async move {
            conn.get::<_, Option<String>>(&key)
                .await
                .map_err(|e| CacheError::Command(format!("GET {key} failed: {e}")))
        })
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheFuture<'_, ()> {
        let mut conn = self.conn_manager.clone();
        let key = key.to_string();
        let value = value.to_string();
        Box::pin(async move {
            let result: redis::RedisResult<()> = match ttl {
                Some(ttl) => conn.set_ex(&key, value, ttl.as_secs().max(1)).await,
                None => conn.set(&key, value).await,
            };
            result.map_err(|e| CacheError::Command(format!("SET {key} failed: {e}")))
        })
    }
}

impl std::fmt::Debug for RedisInventoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisInventoryCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RedisInventoryCache>();
    }

    #[test]
    fn tls_urls_skip_verification() {
        assert_eq!(connection_url("rediss://h:6380"), "rediss://h:6380#insecure");
        assert_eq!(connection_url("rediss://h:6380#insecure"), "rediss://h:6380#insecure");
        assert_eq!(connection_url("redis://h:6379"), "redis://h:6379");
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_error() {
        let result = RedisInventoryCache::new("not-a-url").await;
        assert!(matches!(result, Err(CacheError::Connection(_))));
    }
}
