//! # Stockflow Core
//!
//! Domain types and capability traits for the Stockflow inventory pipeline.
//!
//! Stock-change events arrive from a Kafka-compatible broker, are applied to a
//! durable store of record, mirrored into a cache for the read path, and may
//! produce a low-stock alert on an output topic. This crate holds everything
//! those pieces agree on:
//!
//! - **Data model**: [`inventory`] records, keys, audit entries and update outcomes
//! - **Wire formats**: inbound [`message`]s and outbound [`alert`]s (JSON)
//! - **Capabilities**: [`store::InventoryStore`], [`cache::InventoryCache`],
//!   [`alert::AlertSink`] and [`environment::Clock`], injected at construction
//!
//! ## Architecture
//!
//! ```text
//! broker partition
//!        │
//!        ▼
//! ┌─────────────────┐    ┌──────────────┐
//! │ Partition loop  │───►│ Message      │ (side channel)
//! └────────┬────────┘    │ buffer       │
//!          │             └──────────────┘
//!          ▼
//! ┌─────────────────┐    ┌──────────────┐
//! │ Inventory       │◄──►│ Cache        │ (advisory)
//! │ engine          │    └──────────────┘
//! │                 │    ┌──────────────┐
//! │                 │◄──►│ Store        │◄─── Source of truth
//! └────────┬────────┘    └──────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Alert sink      │ (only when stock < threshold)
//! └─────────────────┘
//! ```
//!
//! Implementations live in sibling crates: `stockflow-postgres`,
//! `stockflow-redis`, `stockflow-redpanda` and the in-memory doubles in
//! `stockflow-testing`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod alert;
pub mod cache;
pub mod inventory;
pub mod message;
pub mod store;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

/// Environment module - time abstraction
///
/// Components that stamp data with the current time take a [`Clock`]
/// so tests can pin it.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::environment::{Clock, SystemClock};

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
