//! Inventory data model.
//!
//! One [`InventoryRecord`] exists per (product, warehouse) pair in the durable
//! store. The cache mirrors the two numbers the pipeline needs on its hot path,
//! stock level and alert threshold, as a [`CachedInventory`] under a composite
//! string key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one inventory record.
///
/// Field order follows the composite cache key, which is warehouse-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InventoryKey {
    /// Warehouse holding the stock
    pub warehouse_id: i32,
    /// Product being stocked
    pub product_id: i32,
}

impl InventoryKey {
    /// Create a key from product and warehouse identifiers.
    #[must_use]
    pub const fn new(product_id: i32, warehouse_id: i32) -> Self {
        Self {
            warehouse_id,
            product_id,
        }
    }

    /// Deterministic cache key: `"{warehouse_id}:{product_id}"`.
    ///
    /// # Example
    ///
    /// ```
    /// use stockflow_core::inventory::InventoryKey;
    ///
    /// let key = InventoryKey::new(7, 3);
    /// assert_eq!(key.cache_key(), "3:7");
    /// ```
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.warehouse_id, self.product_id)
    }
}

impl fmt::Display for InventoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "product {} in warehouse {}",
            self.product_id, self.warehouse_id
        )
    }
}

/// Row of record for one (product, warehouse) pair.
///
/// Mutated only inside a transaction owned by the inventory engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    /// Product being stocked
    pub product_id: i32,
    /// Warehouse holding the stock
    pub warehouse_id: i32,
    /// Units on hand, never negative
    pub stock_level: i32,
    /// Stock below this level triggers a low-stock alert
    pub alert_threshold: i32,
}

impl InventoryRecord {
    /// Key identifying this record.
    #[must_use]
    pub const fn key(&self) -> InventoryKey {
        InventoryKey::new(self.product_id, self.warehouse_id)
    }
}

/// Cached view of a record: stock level and alert threshold.
///
/// Encoded as `"{stock},{threshold}"`. The cache is advisory; a value that
/// does not parse is treated exactly like a missing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedInventory {
    /// Units on hand when the entry was written
    pub stock_level: i32,
    /// Alert threshold when the entry was written
    pub alert_threshold: i32,
}

impl CachedInventory {
    /// Create a cached view.
    #[must_use]
    pub const fn new(stock_level: i32, alert_threshold: i32) -> Self {
        Self {
            stock_level,
            alert_threshold,
        }
    }

    /// Encode for storage in the cache tier.
    #[must_use]
    pub fn encode(&self) -> String {
        format!("{},{}", self.stock_level, self.alert_threshold)
    }

    /// Parse a cached value.
    ///
    /// Returns `None` unless the value is exactly two comma-separated integers.
    ///
    /// # Example
    ///
    /// ```
    /// use stockflow_core::inventory::CachedInventory;
    ///
    /// assert_eq!(CachedInventory::parse("10,8"), Some(CachedInventory::new(10, 8)));
    /// assert_eq!(CachedInventory::parse("10"), None);
    /// assert_eq!(CachedInventory::parse("ten,8"), None);
    /// ```
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let mut fields = value.split(',');
        let stock = fields.next()?.parse().ok()?;
        let threshold = fields.next()?.parse().ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self::new(stock, threshold))
    }
}

impl From<InventoryRecord> for CachedInventory {
    fn from(record: InventoryRecord) -> Self {
        Self::new(record.stock_level, record.alert_threshold)
    }
}

/// Audit-trail row, one per committed update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLogEntry {
    /// Stock level before the update
    pub previous_stock: i32,
    /// Stock level after the update
    pub updated_stock: i32,
    /// Product that changed
    pub product_id: i32,
    /// Warehouse that changed
    pub warehouse_id: i32,
}

/// Result of a committed stock update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockUpdateOutcome {
    /// Stock level the delta was applied to
    pub previous_stock: i32,
    /// Stock level after the delta
    pub new_stock: i32,
    /// Alert threshold read alongside the stock level
    pub threshold: i32,
}

impl StockUpdateOutcome {
    /// Whether the new level is below the alert threshold.
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.new_stock < self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_warehouse_first() {
        assert_eq!(InventoryKey::new(2, 1).cache_key(), "1:2");
    }

    #[test]
    fn parse_rejects_wrong_field_count() {
        assert_eq!(CachedInventory::parse(""), None);
        assert_eq!(CachedInventory::parse("1,2,3"), None);
        assert_eq!(CachedInventory::parse("1,"), None);
    }

    #[test]
    fn parse_rejects_non_numeric_fields() {
        assert_eq!(CachedInventory::parse("a,2"), None);
        assert_eq!(CachedInventory::parse("1,b"), None);
        assert_eq!(CachedInventory::parse("1.5,2"), None);
    }

    #[test]
    fn parse_accepts_negative_threshold() {
        assert_eq!(
            CachedInventory::parse("0,-1"),
            Some(CachedInventory::new(0, -1))
        );
    }

    #[test]
    fn low_stock_is_strictly_below_threshold() {
        let at = StockUpdateOutcome {
            previous_stock: 10,
            new_stock: 8,
            threshold: 8,
        };
        let below = StockUpdateOutcome { new_stock: 7, ..at };
        assert!(!at.is_low_stock());
        assert!(below.is_low_stock());
    }
}
