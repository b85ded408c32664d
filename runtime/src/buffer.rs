//! Bounded buffer of recently received messages.
//!
//! The buffer is an inspection side channel: the consumption loop records
//! every delivered message before handling it, and the read API exposes a
//! snapshot. Nothing on the update path ever reads it back.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use stockflow_core::message::BufferedMessage;

/// Capacity used when none is configured.
pub const DEFAULT_CAPACITY: usize = 10;

/// FIFO of the last `capacity` messages, shared across partition loops.
///
/// # Example
///
/// ```
/// use stockflow_core::Utc;
/// use stockflow_core::message::{BufferedMessage, InboundMessage};
/// use stockflow_runtime::buffer::MessageBuffer;
///
/// let buffer = MessageBuffer::new(2);
/// for offset in 0..3 {
///     let message = InboundMessage::new("stock", 0, offset, Vec::new());
///     buffer.save(BufferedMessage::capture(&message, Utc::now()));
/// }
/// let offsets: Vec<i64> = buffer.snapshot().iter().map(|m| m.offset).collect();
/// assert_eq!(offsets, vec![1, 2]);
/// ```
#[derive(Debug)]
pub struct MessageBuffer {
    capacity: usize,
    messages: Mutex<VecDeque<BufferedMessage>>,
}

impl MessageBuffer {
    /// Create a buffer retaining at most `capacity` messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            messages: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append a message, evicting the oldest one if the buffer is full.
    ///
    /// With a capacity of zero nothing is retained.
    pub fn save(&self, message: BufferedMessage) {
        if self.capacity == 0 {
            return;
        }
        let mut messages = self
            .messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if messages.len() >= self.capacity {
            messages.pop_front();
        }
        messages.push_back(message);
    }

    /// Copy of the retained messages, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<BufferedMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Number of retained messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no message is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of retained messages.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use stockflow_core::Utc;
    use stockflow_core::message::InboundMessage;

    fn buffered(offset: i64) -> BufferedMessage {
        let message = InboundMessage::new("stock", 0, offset, format!("m{offset}").into_bytes());
        BufferedMessage::capture(&message, Utc::now())
    }

    #[test]
    fn zero_capacity_retains_nothing() {
        let buffer = MessageBuffer::new(0);
        buffer.save(buffered(1));
        assert!(buffer.is_empty());
    }

    #[test]
    fn keeps_insertion_order_below_capacity() {
        let buffer = MessageBuffer::default();
        buffer.save(buffered(5));
        buffer.save(buffered(6));
        let values: Vec<String> = buffer.snapshot().into_iter().map(|m| m.value).collect();
        assert_eq!(values, vec!["m5", "m6"]);
        assert_eq!(buffer.capacity(), DEFAULT_CAPACITY);
    }

    proptest! {
        #[test]
        fn retains_exactly_the_last_n(capacity in 1usize..16, inserts in 0i64..64) {
            let buffer = MessageBuffer::new(capacity);
            for offset in 0..inserts {
                buffer.save(buffered(offset));
            }
            let kept: Vec<i64> = buffer.snapshot().iter().map(|m| m.offset).collect();
            let first = (inserts - capacity as i64).max(0);
            let expected: Vec<i64> = (first..inserts).collect();
            prop_assert_eq!(kept, expected);
            prop_assert!(buffer.len() <= capacity);
        }
    }
}
