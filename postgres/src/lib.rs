//! `PostgreSQL` inventory store for Stockflow.
//!
//! This crate implements the [`InventoryStore`] capability from
//! `stockflow-core` on a sqlx connection pool:
//!
//! - Row-locking reads (`SELECT ... FOR UPDATE`) inside transactions
//! - Stock updates and audit entries committed together
//! - Lock-free reads for the read API
//! - Bundled migrations for the `inventory` and `stock_log` tables
//!
//! # Example
//!
//! ```ignore
//! use stockflow_postgres::{PgStoreOptions, PostgresInventoryStore};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresInventoryStore::connect(
//!         "postgres://localhost/stockflow",
//!         &PgStoreOptions::default(),
//!     )
//!     .await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::str::FromStr;
use std::time::Duration;
use stockflow_core::inventory::{InventoryKey, InventoryRecord, StockLogEntry};
use stockflow_core::store::{InventoryStore, InventoryTransaction, StoreError, StoreFuture};

const SELECT_INVENTORY: &str = "SELECT product_id, warehouse_id, stock_level, alert_threshold \
     FROM inventory WHERE product_id = $1 AND warehouse_id = $2";

type InventoryRow = (i32, i32, i32, i32);

fn record_from_row((product_id, warehouse_id, stock_level, alert_threshold): InventoryRow) -> InventoryRecord {
    InventoryRecord {
        product_id,
        warehouse_id,
        stock_level,
        alert_threshold,
    }
}

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PgStoreOptions {
    /// Maximum pooled connections (default: 10)
    pub max_connections: u32,
    /// How long to wait for a free connection (default: 5 seconds)
    pub acquire_timeout: Duration,
    /// Server-side `statement_timeout`, if any
    pub statement_timeout: Option<Duration>,
}

impl Default for PgStoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            statement_timeout: None,
        }
    }
}

/// `PostgreSQL`-backed [`InventoryStore`].
///
/// Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a new pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the URL is invalid or no connection
    /// can be established.
    pub async fn connect(database_url: &str, options: &PgStoreOptions) -> Result<Self, StoreError> {
        let mut connect_options = PgConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Database(format!("Invalid database URL: {e}")))?;
        if let Some(timeout) = options.statement_timeout {
            connect_options =
                connect_options.options([("statement_timeout", timeout.as_millis().to_string())]);
        }

        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;

        tracing::info!(
            max_connections = options.max_connections,
            statement_timeout = ?options.statement_timeout,
            "Connected to PostgreSQL"
        );
        Ok(Self::new(pool))
    }

    /// Run the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))
    }

    /// Underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl InventoryStore for PostgresInventoryStore {
    fn begin(&self) -> StoreFuture<'_, Box<dyn InventoryTransaction>> {
        Box::pin(async move {
            let tx = self
                .pool
                .begin()
                .await
                .map_err(|e| StoreError::Transaction(format!("Failed to start transaction: {e}")))?;
            let tx: Box<dyn InventoryTransaction> = Box::new(PostgresTransaction { tx });
            Ok(tx)
        })
    }

    fn get_inventory(&self, key: InventoryKey) -> StoreFuture<'_, InventoryRecord> {
        Box::pin(async move {
            sqlx::query_as::<_, InventoryRow>(SELECT_INVENTORY)
                .bind(key.product_id)
                .bind(key.warehouse_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Database(format!("Failed to get inventory: {e}")))?
                .map(record_from_row)
                .ok_or(StoreError::NotFound(key))
        })
    }
}

/// One open `PostgreSQL` transaction.
///
/// Dropping it without commit rolls back when the connection returns to the
/// pool.
struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl InventoryTransaction for PostgresTransaction {
    fn get_inventory(&mut self, key: InventoryKey) -> StoreFuture<'_, InventoryRecord> {
        Box::pin(async move {
            let query = format!("{SELECT_INVENTORY} FOR UPDATE");
            sqlx::query_as::<_, InventoryRow>(&query)
                .bind(key.product_id)
                .bind(key.warehouse_id)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| StoreError::Database(format!("Failed to lock inventory: {e}")))?
                .map(record_from_row)
                .ok_or(StoreError::NotFound(key))
        })
    }

    fn update_inventory(&mut self, key: InventoryKey, stock_level: i32) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE inventory SET stock_level = $3 WHERE product_id = $1 AND warehouse_id = $2",
            )
            .bind(key.product_id)
            .bind(key.warehouse_id)
            .bind(stock_level)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to update inventory: {e}")))?;

            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(key));
            }
            Ok(())
        })
    }

    fn insert_stock_log(&mut self, entry: StockLogEntry) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(
                r"
                INSERT INTO stock_log (product_id, warehouse_id, previous_stock, updated_stock)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(entry.product_id)
            .bind(entry.warehouse_id)
            .bind(entry.previous_stock)
            .bind(entry.updated_stock)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to insert stock log: {e}")))?;
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        let Self { tx } = *self;
        Box::pin(async move {
            tx.commit()
                .await
                .map_err(|e| StoreError::Transaction(format!("Failed to commit transaction: {e}")))
        })
    }

    fn rollback(self: Box<Self>) -> StoreFuture<'static, ()> {
        let Self { tx } = *self;
        Box::pin(async move {
            tx.rollback()
                .await
                .map_err(|e| StoreError::Transaction(format!("Failed to roll back transaction: {e}")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostgresInventoryStore>();
    }

    #[test]
    fn default_options() {
        let options = PgStoreOptions::default();
        assert_eq!(options.max_connections, 10);
        assert!(options.statement_timeout.is_none());
    }
}
