//! Consumer-group rebalance callbacks.

use crate::dispatcher::PartitionRegistry;
use rdkafka::client::ClientContext;
use rdkafka::consumer::{BaseConsumer, Consumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::topic_partition_list::TopicPartitionList;
use std::time::Duration;
use stockflow_runtime::ReadySignal;
use tracing::{error, info, warn};

/// Stream consumer with Stockflow's rebalance callbacks.
pub type GroupConsumer = StreamConsumer<RebalanceContext>;

/// Rebalance callbacks for the consumer-group member.
///
/// - On the first assignment, flips the shared [`ReadySignal`].
/// - On revocation, stops the revoked partitions' workers and blocks until
///   each has finished the message in hand (or `revoke_timeout` elapses), so
///   the next owner never overlaps with this member.
pub struct RebalanceContext {
    ready: ReadySignal,
    partitions: PartitionRegistry,
    revoke_timeout: Duration,
}

impl RebalanceContext {
    /// Create a context that revokes workers held in `partitions`.
    #[must_use]
    pub const fn new(ready: ReadySignal, partitions: PartitionRegistry, revoke_timeout: Duration) -> Self {
        Self {
            ready,
            partitions,
            revoke_timeout,
        }
    }
}

fn partitions(list: &TopicPartitionList) -> Vec<i32> {
    list.elements().iter().map(|e| e.partition()).collect()
}

/// Entries of `list` whose partition is in `selected`.
fn select(list: &TopicPartitionList, selected: &[i32]) -> TopicPartitionList {
    let mut subset = TopicPartitionList::new();
    for element in list.elements() {
        if selected.contains(&element.partition()) {
            subset.add_partition(element.topic(), element.partition());
        }
    }
    subset
}

impl ClientContext for RebalanceContext {}

impl ConsumerContext for RebalanceContext {
    fn pre_rebalance(&self, base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        if let Rebalance::Revoke(list) = rebalance {
            let revoked = partitions(list);
            info!(partitions = ?revoked, "Partitions revoked");
            let paused = self.partitions.revoke(&revoked, self.revoke_timeout);
            if !paused.is_empty() {
                if let Err(e) = base_consumer.resume(&select(list, &paused)) {
                    warn!(partitions = ?paused, error = %e, "Failed to resume revoked partitions");
                }
            }
        }
    }

    fn post_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        match rebalance {
            Rebalance::Assign(list) => {
                info!(partitions = ?partitions(list), "Partitions assigned");
                if self.ready.signal() {
                    info!("Consumer group joined");
                }
            }
            Rebalance::Revoke(list) => {
                info!(partitions = ?partitions(list), "Revoked partitions released");
            }
            Rebalance::Error(e) => error!(error = %e, "Rebalance failed"),
        }
    }
}

impl std::fmt::Debug for RebalanceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebalanceContext")
            .field("partitions", &self.partitions)
            .field("revoke_timeout", &self.revoke_timeout)
            .finish_non_exhaustive()
    }
}
