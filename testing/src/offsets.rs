//! Offset marker that records marked positions.

use std::sync::{Arc, Mutex};
use stockflow_core::message::{InboundMessage, OffsetError, OffsetMarker};

/// [`OffsetMarker`] that keeps `(partition, offset)` pairs in marking order.
#[derive(Debug, Clone, Default)]
pub struct RecordingOffsetMarker {
    marked: Arc<Mutex<Vec<(i32, i64)>>>,
}

impl RecordingOffsetMarker {
    /// Create an empty marker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Positions marked so far.
    #[must_use]
    pub fn marked(&self) -> Vec<(i32, i64)> {
        self.marked.lock().unwrap().clone()
    }

    /// Whether `offset` on `partition` has been marked.
    #[must_use]
    pub fn is_marked(&self, partition: i32, offset: i64) -> bool {
        self.marked.lock().unwrap().contains(&(partition, offset))
    }
}

impl OffsetMarker for RecordingOffsetMarker {
    fn mark(&self, message: &InboundMessage) -> Result<(), OffsetError> {
        self.marked
            .lock()
            .unwrap()
            .push((message.partition, message.offset));
        Ok(())
    }
}
