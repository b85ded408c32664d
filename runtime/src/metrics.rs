//! Prometheus metrics for the inventory pipeline.
//!
//! Components record through [`PipelineMetrics`]; the binary installs the
//! Prometheus recorder once through [`MetricsRecorder`] and the read API
//! renders it on `/metrics`. Without an installed recorder every call is a
//! no-op.
//!
//! # Example
//!
//! ```rust,no_run
//! use stockflow_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = MetricsRecorder::new();
//! recorder.install()?;
//! let text = recorder.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Updates committed to the store.
pub const UPDATES_APPLIED: &str = "stockflow.updates.applied";
/// Updates rejected or aborted, labelled by `reason`.
pub const UPDATES_REJECTED: &str = "stockflow.updates.rejected";
/// Low-stock alerts published.
pub const ALERTS_PUBLISHED: &str = "stockflow.alerts.published";
/// Messages whose handling failed and were left unmarked.
pub const MESSAGES_FAILED: &str = "stockflow.messages.failed";
/// Cache lookups that fell through to the store.
pub const CACHE_MISSES: &str = "stockflow.cache.misses";
/// Wall time of one committed update.
pub const UPDATE_DURATION: &str = "stockflow.update.duration_seconds";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Process-wide Prometheus recorder.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe the pipeline metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or a
    /// different recorder is already installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests), this logs a
    /// warning and leaves [`handle`](Self::handle) empty.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                register_metrics();
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Handle for rendering, if this recorder was installed.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

impl std::fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("installed", &self.handle.is_some())
            .finish_non_exhaustive()
    }
}

fn register_metrics() {
    describe_counter!(UPDATES_APPLIED, "Stock updates committed to the store");
    describe_counter!(
        UPDATES_REJECTED,
        "Stock updates rejected or rolled back, by reason"
    );
    describe_counter!(ALERTS_PUBLISHED, "Low-stock alerts published");
    describe_counter!(
        MESSAGES_FAILED,
        "Messages whose handling failed and whose offset was not marked"
    );
    describe_counter!(CACHE_MISSES, "Cache lookups that fell through to the store");
    describe_histogram!(UPDATE_DURATION, "Time taken to apply one stock update");
}

/// Pipeline metrics recorder.
pub struct PipelineMetrics;

impl PipelineMetrics {
    /// Record a committed update.
    pub fn record_applied(duration: Duration) {
        counter!(UPDATES_APPLIED).increment(1);
        histogram!(UPDATE_DURATION).record(duration.as_secs_f64());
    }

    /// Record a rejected or aborted update.
    pub fn record_rejected(reason: &'static str) {
        counter!(UPDATES_REJECTED, "reason" => reason).increment(1);
    }

    /// Record a published alert.
    pub fn record_alert() {
        counter!(ALERTS_PUBLISHED).increment(1);
    }

    /// Record a message left unmarked after a handler failure.
    pub fn record_message_failed() {
        counter!(MESSAGES_FAILED).increment(1);
    }

    /// Record a cache miss (absent, corrupt or unreachable).
    pub fn record_cache_miss() {
        counter!(CACHE_MISSES).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninstalled_recorder_renders_nothing() {
        let recorder = MetricsRecorder::new();
        assert!(recorder.handle().is_none());
        assert!(recorder.render().is_none());
    }

    #[test]
    fn debug_reports_installation_state() {
        let rendered = format!("{:?}", MetricsRecorder::default());
        assert!(rendered.starts_with("MetricsRecorder"));
        assert!(rendered.contains("installed: false"));
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        PipelineMetrics::record_applied(Duration::from_millis(3));
        PipelineMetrics::record_rejected("negative_stock");
        PipelineMetrics::record_cache_miss();
    }
}
