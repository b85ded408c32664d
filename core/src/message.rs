//! Inbound messages.
//!
//! [`InboundMessage`] is the transport-neutral form of one delivered broker
//! record. The consumption loop keeps a [`BufferedMessage`] copy of each one for
//! inspection and hands the payload to a handler, which decodes it into a
//! [`StockUpdateEvent`]. Once handled, the message's offset is reported to an
//! [`OffsetMarker`] so the transport can commit it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Requested change to one (product, warehouse) stock level.
///
/// # Wire format
///
/// ```json
/// {"product_id": 1, "warehouse_id": 2, "stock_delta": -3}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdateEvent {
    /// Product being stocked
    pub product_id: i32,
    /// Warehouse holding the stock
    pub warehouse_id: i32,
    /// Signed change to apply
    pub stock_delta: i32,
}

impl StockUpdateEvent {
    /// Decode a message payload.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the payload is not a valid stock update.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

/// One record delivered from a topic partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic the record was read from
    pub topic: String,
    /// Partition the record was read from
    pub partition: i32,
    /// Offset of the record within its partition
    pub offset: i64,
    /// Record key, if any
    pub key: Option<Vec<u8>>,
    /// Record payload (empty when the record carried none)
    pub payload: Vec<u8>,
    /// Broker timestamp, if the record carried one
    pub timestamp: Option<DateTime<Utc>>,
}

impl InboundMessage {
    /// Create a message with no key and no timestamp.
    #[must_use]
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload,
            timestamp: None,
        }
    }

    /// Attach a broker timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Payload as text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Copy of a received message kept for inspection. Never read by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferedMessage {
    /// Partition the record was read from
    pub partition: i32,
    /// Offset of the record within its partition
    pub offset: i64,
    /// Raw payload as text
    pub value: String,
    /// When this process received the record
    #[serde(rename = "receivedAt")]
    pub received_at: DateTime<Utc>,
}

impl BufferedMessage {
    /// Capture a delivered message at the given receive time.
    #[must_use]
    pub fn capture(message: &InboundMessage, received_at: DateTime<Utc>) -> Self {
        Self {
            partition: message.partition,
            offset: message.offset,
            value: message.payload_lossy(),
            received_at,
        }
    }
}

/// Errors reported when an offset cannot be marked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OffsetError {
    /// The transport refused to store the offset (e.g. partition no longer owned)
    #[error("Failed to store offset {offset} for {topic}/{partition}: {reason}")]
    Store {
        /// Topic of the message
        topic: String,
        /// Partition of the message
        partition: i32,
        /// Offset that could not be stored
        offset: i64,
        /// The reason for failure
        reason: String,
    },
}

/// Records that a message has been processed.
///
/// Marking is advisory: implementations hand the offset to a periodic commit,
/// so a crash between marking and committing redelivers marked messages.
pub trait OffsetMarker: Send + Sync {
    /// Mark `message` as processed.
    ///
    /// # Errors
    ///
    /// Returns [`OffsetError::Store`] if the transport rejects the offset.
    fn mark(&self, message: &InboundMessage) -> Result<(), OffsetError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_stock_update() {
        let event =
            StockUpdateEvent::decode(br#"{"product_id":1,"warehouse_id":2,"stock_delta":-3}"#);
        assert!(matches!(
            event,
            Ok(StockUpdateEvent {
                product_id: 1,
                warehouse_id: 2,
                stock_delta: -3
            })
        ));
    }

    #[test]
    fn rejects_missing_fields() {
        assert!(StockUpdateEvent::decode(br#"{"product_id":1,"warehouse_id":2}"#).is_err());
    }

    #[test]
    fn rejects_non_json() {
        assert!(StockUpdateEvent::decode(b"not json").is_err());
    }

    #[test]
    fn capture_keeps_position_and_text() {
        let message = InboundMessage::new("stock", 3, 42, vec![0x66, 0xff, 0x6f]);
        let captured = BufferedMessage::capture(&message, Utc::now());
        assert_eq!(captured.partition, 3);
        assert_eq!(captured.offset, 42);
        assert_eq!(captured.value, "f\u{fffd}o");
    }
}
