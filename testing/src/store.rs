//! In-memory inventory store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use stockflow_core::inventory::{InventoryKey, InventoryRecord, StockLogEntry};
use stockflow_core::store::{InventoryStore, InventoryTransaction, StoreError, StoreFuture};
use tokio::sync::OwnedMutexGuard;

#[derive(Debug, Default)]
struct State {
    records: HashMap<InventoryKey, InventoryRecord>,
    stock_log: Vec<StockLogEntry>,
}

#[derive(Debug, Default)]
struct Faults {
    begin: AtomicBool,
    reads: AtomicBool,
    update: AtomicBool,
    stock_log: AtomicBool,
    commit: AtomicBool,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    // Held for the lifetime of a transaction, mirroring a row lock.
    tx_lock: Arc<tokio::sync::Mutex<()>>,
    faults: Faults,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

/// In-memory [`InventoryStore`] with fault injection.
///
/// Transactions are serialized and stage their writes until commit, so a
/// failed or dropped transaction leaves no trace.
///
/// # Example
///
/// ```
/// use stockflow_core::inventory::{InventoryKey, InventoryRecord};
/// use stockflow_testing::InMemoryInventoryStore;
///
/// let store = InMemoryInventoryStore::new().with_records([InventoryRecord {
///     product_id: 1,
///     warehouse_id: 1,
///     stock_level: 3,
///     alert_threshold: 0,
/// }]);
/// assert_eq!(store.record(InventoryKey::new(1, 1)).map(|r| r.stock_level), Some(3));
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryStore {
    inner: Arc<Inner>,
}

impl InMemoryInventoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with records.
    #[must_use]
    pub fn with_records(self, records: impl IntoIterator<Item = InventoryRecord>) -> Self {
        for record in records {
            self.insert(record);
        }
        self
    }

    /// Insert or replace a record.
    pub fn insert(&self, record: InventoryRecord) {
        self.inner
            .state
            .lock()
            .unwrap()
            .records
            .insert(record.key(), record);
    }

    /// Committed record for `key`.
    #[must_use]
    pub fn record(&self, key: InventoryKey) -> Option<InventoryRecord> {
        self.inner.state.lock().unwrap().records.get(&key).copied()
    }

    /// Committed audit entries, in commit order.
    #[must_use]
    pub fn stock_log(&self) -> Vec<StockLogEntry> {
        self.inner.state.lock().unwrap().stock_log.clone()
    }

    /// Number of committed transactions.
    #[must_use]
    pub fn commits(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    /// Number of rolled back transactions.
    #[must_use]
    pub fn rollbacks(&self) -> usize {
        self.inner.rollbacks.load(Ordering::SeqCst)
    }

    /// Make `begin` fail.
    pub fn fail_begin(&self, fail: bool) {
        self.inner.faults.begin.store(fail, Ordering::SeqCst);
    }

    /// Make every read fail with a database error.
    pub fn fail_reads(&self, fail: bool) {
        self.inner.faults.reads.store(fail, Ordering::SeqCst);
    }

    /// Make `update_inventory` fail.
    pub fn fail_update(&self, fail: bool) {
        self.inner.faults.update.store(fail, Ordering::SeqCst);
    }

    /// Make `insert_stock_log` fail.
    pub fn fail_stock_log(&self, fail: bool) {
        self.inner.faults.stock_log.store(fail, Ordering::SeqCst);
    }

    /// Make `commit` fail.
    pub fn fail_commit(&self, fail: bool) {
        self.inner.faults.commit.store(fail, Ordering::SeqCst);
    }

    fn read(&self, key: InventoryKey) -> Result<InventoryRecord, StoreError> {
        if self.inner.faults.reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected read failure".to_string()));
        }
        self.record(key).ok_or(StoreError::NotFound(key))
    }
}

impl InventoryStore for InMemoryInventoryStore {
    fn begin(&self) -> StoreFuture<'_, Box<dyn InventoryTransaction>> {
        Box::pin(async move {
            if self.inner.faults.begin.load(Ordering::SeqCst) {
                return Err(StoreError::Transaction(
                    "injected begin failure".to_string(),
                ));
            }
            let guard = Arc::clone(&self.inner.tx_lock).lock_owned().await;
            let tx: Box<dyn InventoryTransaction> = Box::new(InMemoryTransaction {
                store: self.clone(),
                updates: Vec::new(),
                log: Vec::new(),
                _guard: guard,
            });
            Ok(tx)
        })
    }

    fn get_inventory(&self, key: InventoryKey) -> StoreFuture<'_, InventoryRecord> {
        Box::pin(async move { self.read(key) })
    }
}

struct InMemoryTransaction {
    store: InMemoryInventoryStore,
    updates: Vec<(InventoryKey, i32)>,
    log: Vec<StockLogEntry>,
    _guard: OwnedMutexGuard<()>,
}

impl InMemoryTransaction {
    fn staged(&self, key: InventoryKey) -> Result<InventoryRecord, StoreError> {
        let mut record = self.store.read(key)?;
        if let Some((_, level)) = self.updates.iter().rev().find(|(k, _)| *k == key) {
            record.stock_level = *level;
        }
        Ok(record)
    }
}

impl InventoryTransaction for InMemoryTransaction {
    fn get_inventory(&mut self, key: InventoryKey) -> StoreFuture<'_, InventoryRecord> {
        Box::pin(async move { self.staged(key) })
    }

    fn update_inventory(&mut self, key: InventoryKey, stock_level: i32) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if self.store.inner.faults.update.load(Ordering::SeqCst) {
                return Err(StoreError::Database("injected update failure".to_string()));
            }
            if self.store.record(key).is_none() {
                return Err(StoreError::NotFound(key));
            }
            self.updates.push((key, stock_level));
            Ok(())
        })
    }

    fn insert_stock_log(&mut self, entry: StockLogEntry) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if self.store.inner.faults.stock_log.load(Ordering::SeqCst) {
                return Err(StoreError::Database(
                    "injected stock_log failure".to_string(),
                ));
            }
            self.log.push(entry);
            Ok(())
        })
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            let inner = &self.store.inner;
            if inner.faults.commit.load(Ordering::SeqCst) {
                return Err(StoreError::Transaction(
                    "injected commit failure".to_string(),
                ));
            }
            {
                let mut state = inner.state.lock().unwrap();
                for (key, level) in &self.updates {
                    if let Some(record) = state.records.get_mut(key) {
                        record.stock_level = *level;
                    }
                }
                state.stock_log.extend(self.log.iter().copied());
            }
            inner.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn rollback(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            self.store.inner.rollbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryInventoryStore {
        InMemoryInventoryStore::new().with_records([InventoryRecord {
            product_id: 2,
            warehouse_id: 1,
            stock_level: 10,
            alert_threshold: 8,
        }])
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let store = seeded();
        let key = InventoryKey::new(2, 1);

        let mut tx = store.begin().await.unwrap();
        tx.update_inventory(key, 4).await.unwrap();
        assert_eq!(tx.get_inventory(key).await.unwrap().stock_level, 4);
        assert_eq!(store.record(key).unwrap().stock_level, 10);

        tx.rollback().await.unwrap();
        assert_eq!(store.record(key).unwrap().stock_level, 10);
        assert_eq!(store.rollbacks(), 1);
    }

    #[tokio::test]
    async fn commit_applies_update_and_log_together() {
        let store = seeded();
        let key = InventoryKey::new(2, 1);

        let mut tx = store.begin().await.unwrap();
        tx.update_inventory(key, 7).await.unwrap();
        tx.insert_stock_log(StockLogEntry {
            previous_stock: 10,
            updated_stock: 7,
            product_id: 2,
            warehouse_id: 1,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.record(key).unwrap().stock_level, 7);
        assert_eq!(store.stock_log().len(), 1);
        assert_eq!(store.commits(), 1);
    }

    #[tokio::test]
    async fn failed_commit_discards_writes() {
        let store = seeded();
        store.fail_commit(true);
        let key = InventoryKey::new(2, 1);

        let mut tx = store.begin().await.unwrap();
        tx.update_inventory(key, 1).await.unwrap();
        assert!(tx.commit().await.is_err());
        assert_eq!(store.record(key).unwrap().stock_level, 10);
        assert!(store.stock_log().is_empty());
    }

    #[tokio::test]
    async fn unknown_key_is_not_found() {
        let store = seeded();
        let key = InventoryKey::new(99, 1);
        assert_eq!(
            store.get_inventory(key).await,
            Err(StoreError::NotFound(key))
        );
    }
}
