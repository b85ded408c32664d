//! # Stockflow Runtime
//!
//! The event-driven update pipeline, independent of any particular broker,
//! database or cache:
//!
//! - [`buffer::MessageBuffer`]: bounded FIFO of recent raw messages
//! - [`cache_aside::CacheAside`]: advisory cache view that never fails a write
//! - [`engine::InventoryEngine`]: transactional stock mutation and cache-aside reads
//! - [`alert::AlertEmitter`]: conditional low-stock alert
//! - [`handler::StockUpdateHandler`]: decode, apply, alert
//! - [`consumer::PartitionWorker`]: one sequential loop per partition
//! - [`metrics`]: Prometheus counters and histograms
//!
//! Collaborators are passed in as `Arc<dyn ...>` capabilities from
//! `stockflow-core`; production wiring lives in `stockflow-server`.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use stockflow_core::inventory::InventoryRecord;
//! use stockflow_runtime::cache_aside::CacheAside;
//! use stockflow_runtime::engine::InventoryEngine;
//! use stockflow_testing::{InMemoryCache, InMemoryInventoryStore};
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryInventoryStore::new().with_records([InventoryRecord {
//!     product_id: 2,
//!     warehouse_id: 1,
//!     stock_level: 10,
//!     alert_threshold: 8,
//! }]);
//! let engine = InventoryEngine::new(
//!     Arc::new(store),
//!     CacheAside::new(Arc::new(InMemoryCache::new())),
//! );
//! let outcome = engine.apply_delta(2, 1, -3).await?;
//! assert!(outcome.is_low_stock());
//! # Ok::<(), stockflow_runtime::engine::InventoryError>(())
//! # });
//! ```

pub mod alert;
pub mod buffer;
pub mod cache_aside;
pub mod consumer;
pub mod engine;
pub mod handler;
pub mod metrics;

pub use alert::AlertEmitter;
pub use buffer::MessageBuffer;
pub use cache_aside::CacheAside;
pub use consumer::{
    ExitReason, LoopState, PartitionReport, PartitionWorker, ReadySignal, WorkerContext,
};
pub use engine::{InventoryEngine, InventoryError};
pub use handler::{HandlerError, MessageHandler, StockUpdateHandler};
