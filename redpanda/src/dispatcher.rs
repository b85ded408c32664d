//! Routing of inbound messages to per-partition workers.
//!
//! The [`Dispatcher`] runs on the consumer task and never waits on a worker:
//! a message for a partition whose queue is full is held back and the
//! partition is paused until the worker catches up. Worker slots live in a
//! [`PartitionRegistry`] shared with the rebalance callbacks, which stop
//! revoked workers and wait for them before the rebalance completes.

use std::collections::{HashMap, VecDeque};
use std::sync::mpsc::{self as sync_mpsc, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use stockflow_core::message::InboundMessage;
use stockflow_runtime::{PartitionReport, PartitionWorker, WorkerContext};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Fetch control for individual partitions.
pub trait PartitionFlow: Send + Sync {
    /// Stop fetching `partition` until it is resumed.
    fn pause(&self, partition: i32);

    /// Resume fetching `partition`.
    fn resume(&self, partition: i32);
}

struct PartitionSlot {
    sender: mpsc::Sender<InboundMessage>,
    stop: watch::Sender<bool>,
    handle: JoinHandle<PartitionReport>,
    // Disconnects when the worker task ends
    stopped: sync_mpsc::Receiver<()>,
    pending: VecDeque<InboundMessage>,
    paused: bool,
}

impl PartitionSlot {
    fn spawn(partition: i32, capacity: usize, context: &WorkerContext) -> Self {
        info!(partition, "Starting partition worker");
        let (sender, receiver) = mpsc::channel(capacity);
        let (stop, stop_rx) = watch::channel(false);
        let (stopped_tx, stopped) = sync_mpsc::channel::<()>();
        let worker = PartitionWorker::new(partition, context.clone());
        let handle = tokio::spawn(async move {
            let _stopped = stopped_tx;
            worker.run(receiver, stop_rx).await
        });
        Self {
            sender,
            stop,
            handle,
            stopped,
            pending: VecDeque::new(),
            paused: false,
        }
    }

    /// Hand queued messages to the worker until its channel is full.
    ///
    /// Returns `false` if the worker has gone away.
    fn drain_pending(&mut self) -> bool {
        while let Some(message) = self.pending.pop_front() {
            match self.sender.try_send(message) {
                Ok(()) => {}
                Err(TrySendError::Full(message)) => {
                    self.pending.push_front(message);
                    return true;
                }
                Err(TrySendError::Closed(_)) => return false,
            }
        }
        true
    }
}

#[derive(Default)]
struct RegistryState {
    slots: HashMap<i32, PartitionSlot>,
    stopped: Vec<JoinHandle<PartitionReport>>,
}

impl RegistryState {
    fn retire(&mut self, partition: i32) {
        if let Some(slot) = self.slots.remove(&partition) {
            warn!(partition, discarded = slot.pending.len(), "Partition worker stopped unexpectedly");
            self.stopped.push(slot.handle);
        }
    }
}

/// Worker slots shared by the [`Dispatcher`] and the rebalance callbacks.
#[derive(Clone, Default)]
pub struct PartitionRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl PartitionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Partitions that currently have a worker, in ascending order.
    #[must_use]
    pub fn active(&self) -> Vec<i32> {
        let mut partitions: Vec<i32> = self.lock().slots.keys().copied().collect();
        partitions.sort_unstable();
        partitions
    }

    /// Stop the workers of `partitions` and wait for them to exit.
    ///
    /// Each worker finishes the message in hand, then exits without touching
    /// the rest of its queue. Messages held back for the partition are
    /// discarded. Blocks the calling thread for at most `timeout`.
    ///
    /// Returns the revoked partitions that were paused.
    pub fn revoke(&self, partitions: &[i32], timeout: Duration) -> Vec<i32> {
        let mut stopping = Vec::new();
        let mut paused = Vec::new();
        {
            let mut state = self.lock();
            for &partition in partitions {
                if let Some(slot) = state.slots.remove(&partition) {
                    slot.stop.send_replace(true);
                    if slot.paused {
                        paused.push(partition);
                    }
                    debug!(
                        partition,
                        discarded = slot.pending.len(),
                        "Stopping revoked partition worker"
                    );
                    state.stopped.push(slot.handle);
                    stopping.push((partition, slot.stopped));
                }
            }
        }
        if !stopping.is_empty() {
            wait_for_workers(stopping, timeout);
        }
        paused
    }
}

fn wait_for_workers(stopping: Vec<(i32, sync_mpsc::Receiver<()>)>, timeout: Duration) {
    let wait = move || {
        let started = Instant::now();
        for (partition, stopped) in stopping {
            let remaining = timeout.saturating_sub(started.elapsed());
            match stopped.recv_timeout(remaining) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    debug!(partition, "Revoked partition worker stopped");
                }
                Err(RecvTimeoutError::Timeout) => warn!(
                    partition,
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "Revoked partition worker still running"
                ),
            }
        }
    };

    // Let the runtime move other tasks off this thread while it blocks
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(wait);
        }
        _ => wait(),
    }
}

impl std::fmt::Debug for PartitionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionRegistry")
            .field("active", &self.active())
            .finish()
    }
}

/// Spawns one worker per partition and feeds it without blocking.
pub struct Dispatcher {
    registry: PartitionRegistry,
    context: WorkerContext,
    flow: Arc<dyn PartitionFlow>,
    capacity: usize,
}

impl Dispatcher {
    /// Create a dispatcher whose workers queue at most `capacity` messages.
    #[must_use]
    pub fn new(
        registry: PartitionRegistry,
        context: WorkerContext,
        flow: Arc<dyn PartitionFlow>,
        capacity: usize,
    ) -> Self {
        Self {
            registry,
            context,
            flow,
            capacity,
        }
    }

    /// Route `message` to its partition's worker, starting one if needed.
    ///
    /// If the worker's queue is full the message is held back and the
    /// partition is paused; [`flush`](Self::flush) hands it over later.
    pub fn deliver(&self, message: InboundMessage) {
        let partition = message.partition;
        let mut state = self.registry.lock();
        let slot = state
            .slots
            .entry(partition)
            .or_insert_with(|| PartitionSlot::spawn(partition, self.capacity, &self.context));

        slot.pending.push_back(message);
        if !slot.drain_pending() {
            state.retire(partition);
            return;
        }
        if !slot.pending.is_empty() && !slot.paused {
            slot.paused = true;
            debug!(partition, queued = slot.pending.len(), "Partition worker busy, pausing fetch");
            self.flow.pause(partition);
        }
    }

    /// Whether any partition has messages held back.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.registry
            .lock()
            .slots
            .values()
            .any(|slot| !slot.pending.is_empty())
    }

    /// Retry held-back messages and resume partitions that caught up.
    pub fn flush(&self) {
        let mut state = self.registry.lock();
        let mut gone = Vec::new();
        for (&partition, slot) in &mut state.slots {
            if !slot.drain_pending() {
                gone.push(partition);
                continue;
            }
            if slot.pending.is_empty() && slot.paused {
                slot.paused = false;
                debug!(partition, "Partition worker caught up, resuming fetch");
                self.flow.resume(partition);
            }
        }
        for partition in gone {
            state.retire(partition);
        }
    }

    /// Stop every worker and collect the reports of all workers this
    /// dispatcher started, in partition order.
    pub async fn shutdown(self) -> Vec<PartitionReport> {
        let handles = {
            let mut state = self.registry.lock();
            let mut handles = std::mem::take(&mut state.stopped);
            for (_, slot) in state.slots.drain() {
                slot.stop.send_replace(true);
                handles.push(slot.handle);
            }
            handles
        };

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => warn!(error = %e, "Partition worker task failed"),
            }
        }
        reports.sort_by_key(|report| report.partition);
        reports
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}
