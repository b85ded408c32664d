//! Offset marking through librdkafka's offset store.

use crate::context::GroupConsumer;
use rdkafka::consumer::Consumer;
use std::sync::Arc;
use stockflow_core::message::{InboundMessage, OffsetError, OffsetMarker};

/// [`OffsetMarker`] that stores offsets for the next auto-commit.
///
/// The stored position is the offset after the marked message, which is
/// where a restarted member resumes.
#[derive(Clone)]
pub struct KafkaOffsetMarker {
    consumer: Arc<GroupConsumer>,
}

impl KafkaOffsetMarker {
    /// Create a marker for `consumer`.
    #[must_use]
    pub const fn new(consumer: Arc<GroupConsumer>) -> Self {
        Self { consumer }
    }
}

impl OffsetMarker for KafkaOffsetMarker {
    fn mark(&self, message: &InboundMessage) -> Result<(), OffsetError> {
        self.consumer
            .store_offset(
                &message.topic,
                message.partition,
                message.offset.saturating_add(1),
            )
            .map_err(|e| OffsetError::Store {
                topic: message.topic.clone(),
                partition: message.partition,
                offset: message.offset,
                reason: e.to_string(),
            })
    }
}

impl std::fmt::Debug for KafkaOffsetMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaOffsetMarker").finish_non_exhaustive()
    }
}
