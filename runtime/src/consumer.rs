//! Per-partition consumption loop.
//!
//! The transport (see `stockflow-redpanda`) owns the broker connection and
//! spawns one [`PartitionWorker`] per assigned partition, feeding it detached
//! [`InboundMessage`]s over a bounded channel and stopping it through its own
//! stop signal on shutdown or revocation. Each worker processes its
//! partition strictly in order:
//!
//! ```text
//! loop {
//!     select! (biased) {
//!         stop requested      => Draining -> Stopped (queue left as is)
//!         channel closed      => Stopped
//!         message delivered   =>
//!             - record into MessageBuffer
//!             - MessageHandler::handle
//!             - Ok  => OffsetMarker::mark
//!             - Err => log, leave unmarked, continue
//!     }
//! }
//! ```
//!
//! A stop is observed only between messages, so an in-flight transaction
//! always runs to commit or rollback, and nothing queued behind it is
//! handled once the stop is seen.

use crate::buffer::MessageBuffer;
use crate::handler::MessageHandler;
use crate::metrics::PipelineMetrics;
use std::sync::Arc;
use stockflow_core::environment::Clock;
use stockflow_core::message::{BufferedMessage, InboundMessage, OffsetMarker};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Lifecycle of a partition loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Created, not yet started
    Idle,
    /// Processing messages
    Running,
    /// Shutdown observed, finishing up
    Draining,
    /// Exited
    Stopped,
}

/// Why a partition loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The transport closed the partition's channel (revoked or shut down)
    ChannelClosed,
    /// Stop was requested (shutdown or partition revocation)
    Cancelled,
}

/// Summary returned when a partition loop stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionReport {
    /// Partition the loop consumed
    pub partition: i32,
    /// Messages handled successfully
    pub handled: u64,
    /// Messages whose handling failed
    pub failed: u64,
    /// Last offset handed to the offset marker
    pub last_marked: Option<i64>,
    /// Why the loop stopped
    pub exit: ExitReason,
}

/// One-shot readiness flag shared by every partition loop.
///
/// The first [`signal`](Self::signal) flips it; later calls are no-ops.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ReadySignal {
    /// Create an unsignalled flag.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Mark ready. Returns `true` only for the call that flipped the flag.
    pub fn signal(&self) -> bool {
        self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        })
    }

    /// Whether the flag has been signalled.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.tx.borrow()
    }

    /// Receiver observing the flag.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Collaborators shared by every partition loop.
#[derive(Clone)]
pub struct WorkerContext {
    /// Recent-message buffer
    pub buffer: Arc<MessageBuffer>,
    /// Handler invoked per message
    pub handler: Arc<dyn MessageHandler>,
    /// Sink for processed offsets
    pub offsets: Arc<dyn OffsetMarker>,
    /// Readiness flag signalled when a loop starts
    pub ready: ReadySignal,
    /// Clock stamping buffered messages
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("buffer_capacity", &self.buffer.capacity())
            .field("ready", &self.ready.is_ready())
            .finish_non_exhaustive()
    }
}

/// Sequential consumer of one partition.
#[derive(Debug)]
pub struct PartitionWorker {
    partition: i32,
    context: WorkerContext,
    state: LoopState,
    handled: u64,
    failed: u64,
    last_marked: Option<i64>,
}

impl PartitionWorker {
    /// Create an idle worker for `partition`.
    #[must_use]
    pub const fn new(partition: i32, context: WorkerContext) -> Self {
        Self {
            partition,
            context,
            state: LoopState::Idle,
            handled: 0,
            failed: 0,
            last_marked: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Spawn the loop as a background task.
    #[must_use]
    pub fn spawn(
        self,
        messages: mpsc::Receiver<InboundMessage>,
        shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<PartitionReport> {
        tokio::spawn(self.run(messages, shutdown))
    }

    /// Consume `messages` until the channel closes or `shutdown` turns `true`.
    ///
    /// A dropped shutdown sender is treated as a shutdown request.
    pub async fn run(
        mut self,
        mut messages: mpsc::Receiver<InboundMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) -> PartitionReport {
        self.transition(LoopState::Running);
        if self.context.ready.signal() {
            info!(partition = self.partition, "Consumer ready");
        }

        let exit = loop {
            if *shutdown.borrow_and_update() {
                break ExitReason::Cancelled;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break ExitReason::Cancelled;
                    }
                }
                next = messages.recv() => match next {
                    Some(message) => self.process(message).await,
                    None => break ExitReason::ChannelClosed,
                },
            }
        };

        if exit == ExitReason::Cancelled {
            self.transition(LoopState::Draining);
        }
        self.transition(LoopState::Stopped);
        info!(
            partition = self.partition,
            handled = self.handled,
            failed = self.failed,
            last_marked = ?self.last_marked,
            exit = ?exit,
            "Partition loop stopped"
        );

        PartitionReport {
            partition: self.partition,
            handled: self.handled,
            failed: self.failed,
            last_marked: self.last_marked,
            exit,
        }
    }

    async fn process(&mut self, message: InboundMessage) {
        let received_at = self.context.clock.now();
        self.context
            .buffer
            .save(BufferedMessage::capture(&message, received_at));

        match self.context.handler.handle(&message).await {
            Ok(()) => {
                self.handled += 1;
                match self.context.offsets.mark(&message) {
                    Ok(()) => self.last_marked = Some(message.offset),
                    Err(e) => warn!(
                        partition = message.partition,
                        offset = message.offset,
                        error = %e,
                        "Failed to mark offset"
                    ),
                }
            }
            Err(e) => {
                self.failed += 1;
                PipelineMetrics::record_message_failed();
                error!(
                    partition = message.partition,
                    offset = message.offset,
                    timestamp = ?message.timestamp,
                    value = %message.payload_lossy(),
                    error = %e,
                    "Failed to process message"
                );
            }
        }
    }

    fn transition(&mut self, next: LoopState) {
        debug!(partition = self.partition, from = ?self.state, to = ?next, "Partition loop state");
        self.state = next;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::handler::HandlerError;
    use async_trait::async_trait;
    use stockflow_testing::{RecordingOffsetMarker, test_clock};

    /// Fails every message whose payload is `"fail"`.
    struct ScriptedHandler;

    #[async_trait]
    impl MessageHandler for ScriptedHandler {
        async fn handle(&self, message: &InboundMessage) -> Result<(), HandlerError> {
            if message.payload == b"fail" {
                Err(HandlerError::Decode("scripted".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn context(offsets: &RecordingOffsetMarker) -> WorkerContext {
        WorkerContext {
            buffer: Arc::new(MessageBuffer::new(10)),
            handler: Arc::new(ScriptedHandler),
            offsets: Arc::new(offsets.clone()),
            ready: ReadySignal::new(),
            clock: Arc::new(test_clock()),
        }
    }

    fn message(offset: i64, payload: &str) -> InboundMessage {
        InboundMessage::new("stock", 0, offset, payload.as_bytes().to_vec())
    }

    #[test]
    fn ready_signal_fires_once() {
        let ready = ReadySignal::new();
        assert!(!ready.is_ready());
        assert!(ready.signal());
        assert!(!ready.signal());
        assert!(ready.is_ready());
    }

    #[tokio::test]
    async fn failed_message_is_left_unmarked() {
        let offsets = RecordingOffsetMarker::new();
        let ctx = context(&offsets);
        let buffer = Arc::clone(&ctx.buffer);
        let (tx, rx) = mpsc::channel(8);
        let (_stop_tx, stop_rx) = watch::channel(false);

        for (offset, payload) in [(0, "ok"), (1, "fail"), (2, "ok"), (3, "ok")] {
            tx.send(message(offset, payload)).await.unwrap();
        }
        drop(tx);

        let report = PartitionWorker::new(0, ctx).run(rx, stop_rx).await;

        assert_eq!(offsets.marked(), vec![(0, 0), (0, 2), (0, 3)]);
        assert!(!offsets.is_marked(0, 1));
        assert_eq!(report.handled, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.last_marked, Some(3));
        assert_eq!(report.exit, ExitReason::ChannelClosed);
        assert_eq!(buffer.len(), 4);
    }

    #[tokio::test]
    async fn shutdown_stops_without_draining_channel() {
        let offsets = RecordingOffsetMarker::new();
        let (tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        tx.send(message(0, "ok")).await.unwrap();
        stop_tx.send(true).unwrap();

        let report = PartitionWorker::new(0, context(&offsets)).run(rx, stop_rx).await;

        assert_eq!(report.exit, ExitReason::Cancelled);
        assert_eq!(report.handled, 0);
        assert!(offsets.marked().is_empty());
    }

    #[tokio::test]
    async fn shutdown_interrupts_idle_loop() {
        let offsets = RecordingOffsetMarker::new();
        let (_tx, rx) = mpsc::channel::<InboundMessage>(1);
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = PartitionWorker::new(3, context(&offsets)).spawn(rx, stop_rx);
        tokio::task::yield_now().await;
        stop_tx.send(true).unwrap();

        let report = handle.await.unwrap();
        assert_eq!(report.partition, 3);
        assert_eq!(report.exit, ExitReason::Cancelled);
    }

    #[tokio::test]
    async fn readiness_fires_once_across_partitions() {
        let offsets = RecordingOffsetMarker::new();
        let ctx = context(&offsets);
        let ready = ctx.ready.clone();
        let mut ready_rx = ready.subscribe();
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut handles = Vec::new();
        let mut senders = Vec::new();
        for partition in 0..4 {
            let (tx, rx) = mpsc::channel(1);
            senders.push(tx);
            handles.push(PartitionWorker::new(partition, ctx.clone()).spawn(rx, stop_rx.clone()));
        }

        ready_rx.changed().await.unwrap();
        assert!(*ready_rx.borrow_and_update());
        assert!(!ready.signal());

        stop_tx.send(true).unwrap();
        for handle in handles {
            assert_eq!(handle.await.unwrap().exit, ExitReason::Cancelled);
        }
        assert!(!ready_rx.has_changed().unwrap());
        drop(senders);
    }

    #[tokio::test]
    async fn stop_after_channel_close_skips_queued_messages() {
        let offsets = RecordingOffsetMarker::new();
        let (tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        for offset in 0..5 {
            tx.send(message(offset, "ok")).await.unwrap();
        }
        stop_tx.send_replace(true);
        drop(stop_tx);
        drop(tx);

        let report = PartitionWorker::new(0, context(&offsets)).run(rx, stop_rx).await;

        assert_eq!(report.exit, ExitReason::Cancelled);
        assert_eq!(report.handled, 0);
        assert!(offsets.marked().is_empty());
    }

    #[test]
    fn new_worker_is_idle() {
        let offsets = RecordingOffsetMarker::new();
        assert_eq!(PartitionWorker::new(0, context(&offsets)).state(), LoopState::Idle);
    }
}
