//! Alert sink that records what it is asked to publish.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use stockflow_core::alert::{AlertError, AlertSink, LowStockAlert};

/// [`AlertSink`] that keeps published alerts in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingAlertSink {
    alerts: Arc<Mutex<Vec<LowStockAlert>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingAlertSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts published so far.
    #[must_use]
    pub fn alerts(&self) -> Vec<LowStockAlert> {
        self.alerts.lock().unwrap().clone()
    }

    /// Make `publish` fail without recording.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl AlertSink for RecordingAlertSink {
    fn publish(
        &self,
        alert: &LowStockAlert,
    ) -> Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + '_>> {
        let alert = *alert;
        Box::pin(async move {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AlertError::PublishFailed {
                    topic: "alerts".to_string(),
                    reason: "injected publish failure".to_string(),
                });
            }
            self.alerts.lock().unwrap().push(alert);
            Ok(())
        })
    }
}
