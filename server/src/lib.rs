//! Stockflow server.
//!
//! Process-level wiring for the inventory pipeline: configuration from the
//! environment, connections to PostgreSQL, Redis and Kafka, and the lifecycle
//! that runs the partition dispatcher next to the HTTP read API.
//!
//! ```text
//! Kafka ──► PartitionedConsumer ──► PartitionWorker (one per partition)
//!                                        │
//!                                        ├─► MessageBuffer ──► GET /messages
//!                                        └─► StockUpdateHandler
//!                                               ├─► InventoryEngine ◄── GET /inventory
//!                                               │     ├─► Redis (cache-aside)
//!                                               │     └─► PostgreSQL (transaction)
//!                                               └─► AlertEmitter ──► Kafka alert topic
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod config;
pub mod lifecycle;

pub use bootstrap::Resources;
pub use config::Config;
pub use lifecycle::Application;
