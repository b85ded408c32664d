//! Kafka-compatible transport for Stockflow.
//!
//! This crate connects the broker-neutral pipeline in `stockflow-runtime` to
//! Redpanda, Apache Kafka or any other Kafka-protocol broker through rdkafka:
//!
//! - [`PartitionedConsumer`]: consumer-group member that spawns one
//!   `PartitionWorker` per partition it receives messages for
//! - [`Dispatcher`]: non-blocking routing to those workers, pausing a
//!   partition whose worker falls behind
//! - [`KafkaOffsetMarker`]: stores processed offsets for the periodic
//!   auto-commit
//! - [`KafkaAlertPublisher`]: `AlertSink` writing JSON alerts to a topic
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────────────────┐
//!  broker ──►│ StreamConsumer       │── rebalance ──► RebalanceContext
//!            │ (dispatcher task)    │                 (ready / revoke)
//!            └──────────┬───────────┘                        │
//!                       │                  stop + wait ◄─────┘
//!                       │               (PartitionRegistry)
//!                       │ InboundMessage, per partition
//!          ┌────────────┼────────────┐
//!          ▼            ▼            ▼
//!     ┌─────────┐  ┌─────────┐  ┌─────────┐
//!     │ worker 0│  │ worker 1│  │ worker n│
//!     └────┬────┘  └────┬────┘  └────┬────┘
//!          └── store_offset (on success) ──► auto-commit every interval
//! ```
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with marked offsets:
//! - `enable.auto.offset.store` is off, so only offsets a worker marks are
//!   eligible for commit
//! - `enable.auto.commit` flushes stored offsets every
//!   `auto.commit.interval.ms` (default 1000)
//! - A crash between marking and the next commit redelivers those messages
//! - Ordering is guaranteed within a partition only
//! - A revoked partition's worker finishes the message in hand and drops the
//!   rest of its queue before the rebalance completes
//!
//! # Example
//!
//! ```no_run
//! use stockflow_redpanda::{KafkaConfig, PartitionedConsumer};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = KafkaConfig::builder()
//!     .brokers("localhost:9092")
//!     .group("stockflow")
//!     .topic("stock-updates")
//!     .build()?;
//! let consumer = PartitionedConsumer::new(&config)?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod consumer;
mod context;
mod dispatcher;
mod offsets;
mod producer;

pub use config::{KafkaConfig, KafkaConfigBuilder};
pub use consumer::PartitionedConsumer;
pub use context::{GroupConsumer, RebalanceContext};
pub use dispatcher::{Dispatcher, PartitionFlow, PartitionRegistry};
pub use offsets::KafkaOffsetMarker;
pub use producer::KafkaAlertPublisher;

use thiserror::Error;

/// Errors that prevent the transport from starting.
///
/// These are fatal to the process; errors after startup are logged by the
/// dispatcher instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsumerError {
    /// Required setting missing or invalid
    #[error("Invalid Kafka configuration: {0}")]
    Config(String),

    /// Consumer could not be created
    #[error("Failed to create consumer: {0}")]
    Create(String),

    /// Subscription to the inbound topic failed
    #[error("Failed to subscribe to topic '{topic}': {reason}")]
    Subscribe {
        /// Topic that could not be subscribed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// No broker answered the startup metadata request
    #[error("Failed to reach Kafka brokers '{brokers}': {reason}")]
    Connect {
        /// Configured bootstrap servers
        brokers: String,
        /// The reason for failure
        reason: String,
    },

    /// Producer could not be created
    #[error("Failed to create producer: {0}")]
    Producer(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_error_names_brokers() {
        let err = ConsumerError::Connect {
            brokers: "b1:9096,b2:9096".to_string(),
            reason: "Local: Broker transport failure".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to reach Kafka brokers 'b1:9096,b2:9096': Local: Broker transport failure"
        );
    }
}
