//! Message handlers.
//!
//! A [`MessageHandler`] turns one delivered message into its effects. The
//! consumption loop marks the message's offset only when the handler returns
//! `Ok`, so a handler error leaves the message eligible for redelivery after
//! a restart or rebalance.

use crate::alert::AlertEmitter;
use crate::engine::{InventoryEngine, InventoryError};
use async_trait::async_trait;
use stockflow_core::alert::AlertError;
use stockflow_core::message::{InboundMessage, StockUpdateEvent};
use thiserror::Error;

/// Errors from handling one message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// Payload is not a valid stock update; nothing was mutated.
    #[error("Failed to decode message: {0}")]
    Decode(String),

    /// The update was rejected or aborted.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// The update committed but its alert could not be published.
    #[error("Update committed but alert failed: {0}")]
    Alert(#[from] AlertError),
}

/// Handler for delivered messages.
///
/// # Thread Safety
///
/// One handler is shared by every partition loop, so implementors must be
/// `Send + Sync + 'static`.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handle one message.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] if the message could not be fully processed.
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError>;
}

/// Applies stock updates and emits low-stock alerts.
///
/// ```text
/// payload ─► StockUpdateEvent ─► InventoryEngine::apply_delta ─► AlertEmitter::evaluate
/// ```
#[derive(Debug, Clone)]
pub struct StockUpdateHandler {
    engine: InventoryEngine,
    alerts: AlertEmitter,
}

impl StockUpdateHandler {
    /// Create a handler.
    #[must_use]
    pub const fn new(engine: InventoryEngine, alerts: AlertEmitter) -> Self {
        Self { engine, alerts }
    }
}

#[async_trait]
impl MessageHandler for StockUpdateHandler {
    async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
        let event = StockUpdateEvent::decode(&message.payload)
            .map_err(|e| HandlerError::Decode(e.to_string()))?;

        let outcome = self
            .engine
            .apply_delta(event.product_id, event.warehouse_id, event.stock_delta)
            .await?;

        self.alerts
            .evaluate(event.product_id, event.warehouse_id, &outcome)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cache_aside::CacheAside;
    use std::sync::Arc;
    use stockflow_core::alert::LowStockAlert;
    use stockflow_core::inventory::{InventoryKey, InventoryRecord};
    use stockflow_testing::{InMemoryCache, InMemoryInventoryStore, RecordingAlertSink};

    fn handler() -> (StockUpdateHandler, InMemoryInventoryStore, RecordingAlertSink) {
        let store = InMemoryInventoryStore::new().with_records([InventoryRecord {
            product_id: 2,
            warehouse_id: 1,
            stock_level: 10,
            alert_threshold: 8,
        }]);
        let sink = RecordingAlertSink::new();
        let engine = InventoryEngine::new(
            Arc::new(store.clone()),
            CacheAside::new(Arc::new(InMemoryCache::new())),
        );
        let handler = StockUpdateHandler::new(engine, AlertEmitter::new(Arc::new(sink.clone())));
        (handler, store, sink)
    }

    fn message(payload: &str) -> InboundMessage {
        InboundMessage::new("stock", 0, 0, payload.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn decode_failure_mutates_nothing() {
        let (handler, store, _sink) = handler();

        let err = handler.handle(&message("{not json")).await.unwrap_err();

        assert!(matches!(err, HandlerError::Decode(_)));
        assert_eq!(store.commits(), 0);
        assert_eq!(store.rollbacks(), 0);
    }

    #[tokio::test]
    async fn low_stock_update_publishes_alert() {
        let (handler, store, sink) = handler();

        handler
            .handle(&message(r#"{"product_id":2,"warehouse_id":1,"stock_delta":-3}"#))
            .await
            .unwrap();

        assert_eq!(store.record(InventoryKey::new(2, 1)).unwrap().stock_level, 7);
        assert_eq!(
            sink.alerts(),
            vec![LowStockAlert {
                product_id: 2,
                warehouse_id: 1,
                current_stock: 7,
                threshold: 8,
            }]
        );
    }

    #[tokio::test]
    async fn alert_failure_keeps_committed_update() {
        let (handler, store, sink) = handler();
        sink.fail(true);

        let err = handler
            .handle(&message(r#"{"product_id":2,"warehouse_id":1,"stock_delta":-5}"#))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Alert(_)));
        assert_eq!(store.record(InventoryKey::new(2, 1)).unwrap().stock_level, 5);
        assert_eq!(store.stock_log().len(), 1);
    }
}
