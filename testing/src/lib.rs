//! # Stockflow Testing
//!
//! In-memory implementations of every Stockflow capability, for fast,
//! deterministic tests without PostgreSQL, Redis or a broker:
//!
//! - [`InMemoryInventoryStore`]: transactional store with fault injection
//! - [`InMemoryCache`]: string cache with fault injection
//! - [`RecordingAlertSink`]: captures published alerts
//! - [`RecordingOffsetMarker`]: captures marked offsets
//! - [`FixedClock`]: deterministic time
//!
//! ## Example
//!
//! ```
//! use stockflow_core::inventory::InventoryRecord;
//! use stockflow_testing::{InMemoryCache, InMemoryInventoryStore};
//!
//! let store = InMemoryInventoryStore::new();
//! store.insert(InventoryRecord {
//!     product_id: 2,
//!     warehouse_id: 1,
//!     stock_level: 10,
//!     alert_threshold: 8,
//! });
//! let cache = InMemoryCache::new();
//! assert!(cache.is_empty());
//! ```

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on poisoned locks

mod alert;
mod cache;
mod offsets;
mod store;

pub use alert::RecordingAlertSink;
pub use cache::InMemoryCache;
pub use offsets::RecordingOffsetMarker;
pub use store::InMemoryInventoryStore;

/// Mock implementations for testing.
pub mod mocks {
    use chrono::{DateTime, Utc};
    use stockflow_core::environment::Clock;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use stockflow_testing::mocks::FixedClock;
    /// use stockflow_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;
    use stockflow_core::environment::Clock;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }
}
