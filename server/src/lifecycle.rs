//! Application lifecycle management and graceful shutdown.
//!
//! # Graceful Shutdown
//!
//! When a shutdown signal is received (Ctrl+C or SIGTERM):
//! 1. HTTP server stops accepting new connections
//! 2. Shutdown is broadcast to the partition dispatcher and its workers
//! 3. Each worker finishes the message in hand and stops
//! 4. Clean exit, or a warning once the shutdown timeout elapses

use axum::Router;
use std::time::{Duration, Instant};
use stockflow_redpanda::PartitionedConsumer;
use stockflow_runtime::{PartitionReport, WorkerContext};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Running application: HTTP server plus the consumer group member.
pub struct Application {
    listener: TcpListener,
    app: Router,
    consumer: PartitionedConsumer,
    worker_context: WorkerContext,
    shutdown_timeout: Duration,
}

impl Application {
    /// Create a new application instance.
    #[must_use]
    pub const fn new(
        listener: TcpListener,
        app: Router,
        consumer: PartitionedConsumer,
        worker_context: WorkerContext,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            listener,
            app,
            consumer,
            worker_context,
            shutdown_timeout,
        }
    }

    /// Run until Ctrl+C or SIGTERM, then shut down gracefully.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP server fails.
    pub async fn run(self) -> anyhow::Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        log_readiness(&self.worker_context);

        info!("Starting partition dispatcher");
        let consumer = tokio::spawn(self.consumer.run(self.worker_context, shutdown_rx));

        info!(address = %self.listener.local_addr()?, "HTTP server listening for requests");
        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server stopped, initiating graceful shutdown...");
        shutdown_tx.send_replace(true);

        await_shutdown(consumer, self.shutdown_timeout).await;

        info!("Graceful shutdown complete");
        Ok(())
    }
}

fn log_readiness(context: &WorkerContext) {
    let mut ready = context.ready.subscribe();
    let start = Instant::now();
    tokio::spawn(async move {
        if ready.wait_for(|ready| *ready).await.is_ok() {
            info!(
                duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Consumer is ready"
            );
        }
    });
}

async fn await_shutdown(consumer: JoinHandle<Vec<PartitionReport>>, timeout: Duration) {
    match tokio::time::timeout(timeout, consumer).await {
        Ok(Ok(reports)) => {
            for report in reports {
                info!(
                    partition = report.partition,
                    handled = report.handled,
                    failed = report.failed,
                    last_marked = ?report.last_marked,
                    exit = ?report.exit,
                    "Partition worker stopped"
                );
            }
        }
        Ok(Err(e)) => warn!(error = %e, "Partition dispatcher task failed"),
        Err(_) => warn!(
            timeout_secs = timeout.as_secs(),
            "Partition dispatcher shutdown timed out"
        ),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// If a handler cannot be installed, that source is ignored and the other
/// one still ends the wait.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
