//! Low-stock alert evaluation.

use crate::metrics::PipelineMetrics;
use std::sync::Arc;
use stockflow_core::alert::{AlertError, AlertSink, LowStockAlert};
use stockflow_core::inventory::StockUpdateOutcome;
use tracing::{info, warn};

/// Publishes an alert when a committed update leaves stock below threshold.
#[derive(Clone)]
pub struct AlertEmitter {
    sink: Arc<dyn AlertSink>,
}

impl AlertEmitter {
    /// Create an emitter publishing to `sink`.
    #[must_use]
    pub const fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self { sink }
    }

    /// Publish an alert if `outcome` is below its threshold.
    ///
    /// Returns the published alert, or `None` if stock is at or above the
    /// threshold.
    ///
    /// # Errors
    ///
    /// Returns the sink's [`AlertError`] if publishing fails. The update that
    /// produced `outcome` is already committed and stays committed.
    pub async fn evaluate(
        &self,
        product_id: i32,
        warehouse_id: i32,
        outcome: &StockUpdateOutcome,
    ) -> Result<Option<LowStockAlert>, AlertError> {
        if !outcome.is_low_stock() {
            return Ok(None);
        }
        let alert = LowStockAlert {
            product_id,
            warehouse_id,
            current_stock: outcome.new_stock,
            threshold: outcome.threshold,
        };
        match self.sink.publish(&alert).await {
            Ok(()) => {
                PipelineMetrics::record_alert();
                info!(
                    product_id,
                    warehouse_id,
                    current_stock = alert.current_stock,
                    threshold = alert.threshold,
                    "Low-stock alert published"
                );
                Ok(Some(alert))
            }
            Err(e) => {
                warn!(product_id, warehouse_id, error = %e, "Low-stock alert not published");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for AlertEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertEmitter").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use stockflow_testing::RecordingAlertSink;

    const fn outcome(new_stock: i32, threshold: i32) -> StockUpdateOutcome {
        StockUpdateOutcome {
            previous_stock: 10,
            new_stock,
            threshold,
        }
    }

    #[tokio::test]
    async fn publishes_below_threshold() {
        let sink = RecordingAlertSink::new();
        let emitter = AlertEmitter::new(Arc::new(sink.clone()));

        let alert = emitter.evaluate(2, 1, &outcome(7, 8)).await.unwrap();

        let expected = LowStockAlert {
            product_id: 2,
            warehouse_id: 1,
            current_stock: 7,
            threshold: 8,
        };
        assert_eq!(alert, Some(expected));
        assert_eq!(sink.alerts(), vec![expected]);
    }

    #[tokio::test]
    async fn silent_at_threshold() {
        let sink = RecordingAlertSink::new();
        let emitter = AlertEmitter::new(Arc::new(sink.clone()));

        assert_eq!(emitter.evaluate(2, 1, &outcome(8, 8)).await.unwrap(), None);
        assert!(sink.alerts().is_empty());
    }

    #[tokio::test]
    async fn reports_publish_failure() {
        let sink = RecordingAlertSink::new();
        sink.fail(true);
        let emitter = AlertEmitter::new(Arc::new(sink));

        let err = emitter.evaluate(2, 1, &outcome(0, 8)).await.unwrap_err();
        assert!(matches!(err, AlertError::PublishFailed { .. }));
    }
}
