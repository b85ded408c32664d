//! Application state for Axum handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use stockflow_runtime::{InventoryEngine, MessageBuffer, ReadySignal};

/// Application state shared across all HTTP handlers.
///
/// Holds the same engine, buffer and readiness signal the consumer uses, so
/// the read API and the pipeline observe one view of the world.
#[derive(Clone)]
pub struct AppState {
    /// Cache-aside reads for `GET /inventory`
    pub engine: InventoryEngine,
    /// Recent raw messages for `GET /messages`
    pub buffer: Arc<MessageBuffer>,
    /// Flipped once the consumer group has partitions
    pub ready: ReadySignal,
    /// Prometheus handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create application state without a metrics handle.
    #[must_use]
    pub const fn new(engine: InventoryEngine, buffer: Arc<MessageBuffer>, ready: ReadySignal) -> Self {
        Self {
            engine,
            buffer,
            ready,
            metrics: None,
        }
    }

    /// Expose metrics from this handle on `GET /metrics`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine)
            .field("buffer", &self.buffer)
            .field("ready", &self.ready.is_ready())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_clone() {
        fn assert_clone<T: Clone + Send + Sync + 'static>() {}
        assert_clone::<AppState>();
    }
}
