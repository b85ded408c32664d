//! Low-stock alerts.
//!
//! An alert is published after a committed update leaves the stock level below
//! the record's threshold. Publishing is a side effect of a successful update,
//! not part of its atomicity boundary: a failed publish is reported but the
//! committed stock change stands.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Outbound low-stock notification.
///
/// # Wire format
///
/// ```json
/// {"product_id": 2, "warehouse_id": 1, "current_stock": 7, "threshold": 8}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    /// Product running low
    pub product_id: i32,
    /// Warehouse running low
    pub warehouse_id: i32,
    /// Stock level after the update
    pub current_stock: i32,
    /// Threshold the level fell below
    pub threshold: i32,
}

impl LowStockAlert {
    /// Encode as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<Vec<u8>, AlertError> {
        serde_json::to_vec(self).map_err(|e| AlertError::Serialization(e.to_string()))
    }
}

/// Errors that can occur while publishing an alert.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlertError {
    /// Alert could not be encoded
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Destination rejected the alert or was unreachable
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// Destination topic
        topic: String,
        /// The reason for failure
        reason: String,
    },
}

/// Destination for low-stock alerts.
pub trait AlertSink: Send + Sync {
    /// Publish one alert.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::PublishFailed`] if the destination rejects it.
    fn publish(
        &self,
        alert: &LowStockAlert,
    ) -> Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + '_>>;
}
