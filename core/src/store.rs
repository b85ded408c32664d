//! Durable store of record for inventory levels.
//!
//! The store is the sole authority for stock levels. Every mutation runs inside
//! an [`InventoryTransaction`] obtained from [`InventoryStore::begin`]; the audit
//! entry is written in the same transaction so that exactly one
//! [`StockLogEntry`] exists per committed update.
//!
//! # Implementations
//!
//! - `PostgresInventoryStore` (in `stockflow-postgres`): production, sqlx pool
//! - `InMemoryInventoryStore` (in `stockflow-testing`): deterministic tests
//!
//! # Dyn Compatibility
//!
//! Methods return `Pin<Box<dyn Future>>` instead of using `async fn` so the
//! engine can hold an `Arc<dyn InventoryStore>` and transactions can be boxed.

use crate::inventory::{InventoryKey, InventoryRecord, StockLogEntry};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record exists for the key.
    #[error("No inventory for {0}")]
    NotFound(InventoryKey),

    /// Query or connection failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Failure to begin, commit or roll back a transaction.
    #[error("Transaction error: {0}")]
    Transaction(String),
}

/// Future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Durable inventory store.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one store is shared by every
/// partition loop and by the read API.
pub trait InventoryStore: Send + Sync {
    /// Begin a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transaction`] if no transaction can be acquired.
    fn begin(&self) -> StoreFuture<'_, Box<dyn InventoryTransaction>>;

    /// Read a record outside any transaction (read path).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the pair is unknown, or
    /// [`StoreError::Database`] on query failure.
    fn get_inventory(&self, key: InventoryKey) -> StoreFuture<'_, InventoryRecord>;
}

/// A transaction against the inventory store.
///
/// Dropping a transaction without committing discards its writes.
pub trait InventoryTransaction: Send {
    /// Read a record, locking it for the remainder of the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the pair is unknown.
    fn get_inventory(&mut self, key: InventoryKey) -> StoreFuture<'_, InventoryRecord>;

    /// Set the stock level of a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the write fails.
    fn update_inventory(&mut self, key: InventoryKey, stock_level: i32) -> StoreFuture<'_, ()>;

    /// Append an audit entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    fn insert_stock_log(&mut self, entry: StockLogEntry) -> StoreFuture<'_, ()>;

    /// Commit all writes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transaction`] if the commit fails; writes are lost.
    fn commit(self: Box<Self>) -> StoreFuture<'static, ()>;

    /// Discard all writes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transaction`] if the rollback fails.
    fn rollback(self: Box<Self>) -> StoreFuture<'static, ()>;
}
