//! Inventory update engine.
//!
//! [`InventoryEngine::apply_delta`] is the only code path that mutates stock.
//! Each call owns one store transaction from begin to commit or rollback:
//!
//! ```text
//! begin ─► read (cache, else row lock) ─► validate ─► update row
//!        ─► refresh cache ─► insert stock_log ─► commit
//! ```
//!
//! Any failure before commit rolls the transaction back, so the row and its
//! audit entry are written together or not at all. The cache is refreshed
//! before commit; if the transaction then aborts, the previously observed
//! values are written back on a best-effort basis.

use crate::cache_aside::CacheAside;
use crate::metrics::PipelineMetrics;
use std::sync::Arc;
use std::time::Instant;
use stockflow_core::inventory::{InventoryKey, StockLogEntry, StockUpdateOutcome};
use stockflow_core::store::{InventoryStore, InventoryTransaction, StoreError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from inventory reads and updates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// No record for the (product, warehouse) pair.
    #[error("No inventory for {0}")]
    NotFound(InventoryKey),

    /// The delta would drive stock below zero.
    #[error("applying delta {delta} to stock {stock} would make it negative")]
    NegativeStock {
        /// Requested change
        delta: i32,
        /// Stock level the change was applied to
        stock: i32,
    },

    /// The delta would overflow the stock counter.
    #[error("applying delta {delta} to stock {stock} overflows")]
    StockOverflow {
        /// Requested change
        delta: i32,
        /// Stock level the change was applied to
        stock: i32,
    },

    /// The store failed; the transaction was rolled back.
    #[error("Store failure: {0}")]
    Store(StoreError),
}

impl InventoryError {
    /// Whether the update was refused on its merits rather than aborted.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::NegativeStock { .. } | Self::StockOverflow { .. })
    }

    const fn reason(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::NegativeStock { .. } => "negative_stock",
            Self::StockOverflow { .. } => "overflow",
            Self::Store(_) => "store",
        }
    }
}

impl From<StoreError> for InventoryError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(key) => Self::NotFound(key),
            other => Self::Store(other),
        }
    }
}

/// Applies stock deltas and serves cache-aside reads.
///
/// Cloning is cheap; clones share the store and cache.
#[derive(Clone)]
pub struct InventoryEngine {
    store: Arc<dyn InventoryStore>,
    cache: CacheAside,
}

impl InventoryEngine {
    /// Create an engine over a store and its cache.
    #[must_use]
    pub const fn new(store: Arc<dyn InventoryStore>, cache: CacheAside) -> Self {
        Self { store, cache }
    }

    /// Apply `delta` to the stock of one (product, warehouse) pair.
    ///
    /// On success the new level and its audit entry are committed together.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::NotFound`] if the pair has no record
    /// - [`InventoryError::NegativeStock`] / [`InventoryError::StockOverflow`]
    ///   if the result would be out of range; nothing is written
    /// - [`InventoryError::Store`] if any store step fails; the transaction is
    ///   rolled back
    #[tracing::instrument(skip(self), name = "apply_delta")]
    pub async fn apply_delta(
        &self,
        product_id: i32,
        warehouse_id: i32,
        delta: i32,
    ) -> Result<StockUpdateOutcome, InventoryError> {
        let key = InventoryKey::new(product_id, warehouse_id);
        let started = Instant::now();

        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                PipelineMetrics::record_rejected("store");
                return Err(e.into());
            }
        };

        let mut cache_written = None;
        let result = self
            .apply_in(tx.as_mut(), key, delta, &mut cache_written)
            .await;

        let result = match result {
            Ok(outcome) => tx.commit().await.map(|()| outcome).map_err(InventoryError::from),
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(%key, error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        };

        match result {
            Ok(outcome) => {
                PipelineMetrics::record_applied(started.elapsed());
                info!(
                    %key,
                    previous_stock = outcome.previous_stock,
                    new_stock = outcome.new_stock,
                    "Stock updated"
                );
                Ok(outcome)
            }
            Err(e) => {
                if let Some((stock, threshold)) = cache_written {
                    self.cache.set(&key, stock, threshold).await;
                }
                PipelineMetrics::record_rejected(e.reason());
                Err(e)
            }
        }
    }

    /// Steps between begin and commit. `cache_written` receives the values
    /// the cache held before it was refreshed.
    async fn apply_in(
        &self,
        tx: &mut dyn InventoryTransaction,
        key: InventoryKey,
        delta: i32,
        cache_written: &mut Option<(i32, i32)>,
    ) -> Result<StockUpdateOutcome, InventoryError> {
        let (stock, threshold) = match self.cache.get(&key).await {
            Some(cached) => (cached.stock_level, cached.alert_threshold),
            None => {
                let record = tx.get_inventory(key).await?;
                (record.stock_level, record.alert_threshold)
            }
        };

        let new_stock = stock
            .checked_add(delta)
            .ok_or(InventoryError::StockOverflow { delta, stock })?;
        if new_stock < 0 {
            return Err(InventoryError::NegativeStock { delta, stock });
        }

        tx.update_inventory(key, new_stock).await?;

        self.cache.set(&key, new_stock, threshold).await;
        *cache_written = Some((stock, threshold));

        tx.insert_stock_log(StockLogEntry {
            previous_stock: stock,
            updated_stock: new_stock,
            product_id: key.product_id,
            warehouse_id: key.warehouse_id,
        })
        .await?;

        Ok(StockUpdateOutcome {
            previous_stock: stock,
            new_stock,
            threshold,
        })
    }

    /// Current stock level for one pair, without mutation.
    ///
    /// Served from the cache when possible; on a miss the store is read
    /// outside any transaction and the cache is populated.
    ///
    /// # Errors
    ///
    /// - [`InventoryError::NotFound`] if the pair has no record
    /// - [`InventoryError::Store`] if the store read fails
    pub async fn fetch(&self, product_id: i32, warehouse_id: i32) -> Result<i32, InventoryError> {
        let key = InventoryKey::new(product_id, warehouse_id);
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached.stock_level);
        }
        let record = self.store.get_inventory(key).await?;
        debug!(%key, stock_level = record.stock_level, "Populating cache from store");
        self.cache
            .set(&key, record.stock_level, record.alert_threshold)
            .await;
        Ok(record.stock_level)
    }
}

impl std::fmt::Debug for InventoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryEngine")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
