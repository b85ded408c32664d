//! Consumer-group member with per-partition dispatch.

use crate::config::KafkaConfig;
use crate::context::{GroupConsumer, RebalanceContext};
use crate::dispatcher::{Dispatcher, PartitionFlow, PartitionRegistry};
use crate::offsets::KafkaOffsetMarker;
use crate::ConsumerError;
use chrono::{DateTime, Utc};
use rdkafka::consumer::Consumer;
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::topic_partition_list::TopicPartitionList;
use std::sync::Arc;
use std::time::Duration;
use stockflow_core::message::InboundMessage;
use stockflow_runtime::{PartitionReport, ReadySignal, WorkerContext};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// How often held-back messages are offered to their workers again.
const BACKLOG_RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Consumer-group member feeding one `PartitionWorker` per partition.
///
/// The dispatcher task owns the broker connection. It spawns a worker the
/// first time a partition delivers a message and forwards each message over
/// that worker's bounded channel. A partition whose worker falls behind is
/// paused instead of stalling the other partitions. Revocation stops the
/// partition's worker before the rebalance completes.
///
/// # Example
///
/// ```no_run
/// use stockflow_redpanda::{KafkaConfig, PartitionedConsumer};
/// use stockflow_runtime::WorkerContext;
/// use tokio::sync::watch;
///
/// # async fn example(context: WorkerContext) -> Result<(), Box<dyn std::error::Error>> {
/// let config = KafkaConfig::builder()
///     .brokers("localhost:9092")
///     .group("stockflow")
///     .topic("stock-updates")
///     .build()?;
/// let consumer = PartitionedConsumer::new(&config)?;
/// consumer.verify_connectivity().await?;
/// let (_stop, shutdown) = watch::channel(false);
/// let reports = consumer.run(context, shutdown).await;
/// # Ok(())
/// # }
/// ```
pub struct PartitionedConsumer {
    consumer: Arc<GroupConsumer>,
    partitions: PartitionRegistry,
    ready: ReadySignal,
    brokers: String,
    topic: String,
    channel_capacity: usize,
    connect_timeout: Duration,
}

impl PartitionedConsumer {
    /// Create the consumer and subscribe to the configured topic.
    ///
    /// No broker is contacted yet; see
    /// [`verify_connectivity`](Self::verify_connectivity).
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Create`] if the client cannot be created, or
    /// [`ConsumerError::Subscribe`] if the subscription is rejected.
    pub fn new(config: &KafkaConfig) -> Result<Self, ConsumerError> {
        let ready = ReadySignal::new();
        let partitions = PartitionRegistry::new();
        let context = RebalanceContext::new(ready.clone(), partitions.clone(), config.revoke_timeout());

        let consumer: GroupConsumer = config
            .consumer_client_config()
            .create_with_context(context)
            .map_err(|e| ConsumerError::Create(e.to_string()))?;

        consumer
            .subscribe(&[config.topic()])
            .map_err(|e| ConsumerError::Subscribe {
                topic: config.topic().to_string(),
                reason: e.to_string(),
            })?;

        info!(
            brokers = %config.brokers(),
            group = %config.group(),
            topic = %config.topic(),
            channel_capacity = config.channel_capacity(),
            "Subscribed to topic"
        );

        Ok(Self {
            consumer: Arc::new(consumer),
            partitions,
            ready,
            brokers: config.brokers().to_string(),
            topic: config.topic().to_string(),
            channel_capacity: config.channel_capacity(),
            connect_timeout: config.connect_timeout(),
        })
    }

    /// Fetch the topic's metadata to prove a broker is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Connect`] if no broker answers within the
    /// configured connect timeout.
    pub async fn verify_connectivity(&self) -> Result<(), ConsumerError> {
        let consumer = Arc::clone(&self.consumer);
        let topic = self.topic.clone();
        let timeout = self.connect_timeout;
        let connect_error = |reason: String| ConsumerError::Connect {
            brokers: self.brokers.clone(),
            reason,
        };

        let brokers_seen = tokio::task::spawn_blocking(move || {
            consumer
                .fetch_metadata(Some(topic.as_str()), timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| connect_error(e.to_string()))?
        .map_err(|e| connect_error(e.to_string()))?;

        if brokers_seen == 0 {
            return Err(connect_error("metadata listed no brokers".to_string()));
        }
        info!(brokers = %self.brokers, brokers_seen, "Broker connection verified");
        Ok(())
    }

    /// Readiness flag, signalled on the first partition assignment.
    ///
    /// Pass this flag in the [`WorkerContext`] given to [`run`](Self::run) so
    /// the read API and the workers share one signal.
    #[must_use]
    pub fn ready(&self) -> ReadySignal {
        self.ready.clone()
    }

    /// Offset marker bound to this consumer.
    #[must_use]
    pub fn offset_marker(&self) -> KafkaOffsetMarker {
        KafkaOffsetMarker::new(Arc::clone(&self.consumer))
    }

    /// Dispatch messages until `shutdown` turns `true`.
    ///
    /// On return every worker has stopped; their reports are returned in
    /// partition order.
    pub async fn run(
        self,
        context: WorkerContext,
        mut shutdown: watch::Receiver<bool>,
    ) -> Vec<PartitionReport> {
        info!(topic = %self.topic, "Partition dispatcher started");
        let flow = KafkaPartitionFlow {
            consumer: Arc::clone(&self.consumer),
            topic: self.topic.clone(),
        };
        let dispatcher = Dispatcher::new(
            self.partitions.clone(),
            context,
            Arc::new(flow),
            self.channel_capacity,
        );
        let mut backlog = tokio::time::interval(BACKLOG_RETRY_INTERVAL);
        backlog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = backlog.tick(), if dispatcher.has_pending() => dispatcher.flush(),
                received = next_message(&self.consumer) => match received {
                    Ok(message) => dispatcher.deliver(message),
                    Err(e) => warn!(topic = %self.topic, error = %e, "Error receiving message"),
                },
            }
        }

        info!(
            topic = %self.topic,
            partitions = ?self.partitions.active(),
            "Partition dispatcher stopping"
        );
        dispatcher.shutdown().await
    }
}

/// Pauses and resumes partitions of the subscribed topic.
struct KafkaPartitionFlow {
    consumer: Arc<GroupConsumer>,
    topic: String,
}

impl KafkaPartitionFlow {
    fn partition_list(&self, partition: i32) -> TopicPartitionList {
        let mut list = TopicPartitionList::new();
        list.add_partition(&self.topic, partition);
        list
    }
}

impl PartitionFlow for KafkaPartitionFlow {
    fn pause(&self, partition: i32) {
        match self.consumer.pause(&self.partition_list(partition)) {
            Ok(()) => debug!(partition, "Partition paused"),
            Err(e) => warn!(partition, error = %e, "Failed to pause partition"),
        }
    }

    fn resume(&self, partition: i32) {
        match self.consumer.resume(&self.partition_list(partition)) {
            Ok(()) => debug!(partition, "Partition resumed"),
            Err(e) => warn!(partition, error = %e, "Failed to resume partition"),
        }
    }
}

async fn next_message(consumer: &GroupConsumer) -> Result<InboundMessage, KafkaError> {
    consumer.recv().await.map(|message| detach(&message))
}

/// Copy a borrowed record into the transport-neutral form.
fn detach(message: &BorrowedMessage<'_>) -> InboundMessage {
    let mut inbound = InboundMessage::new(
        message.topic(),
        message.partition(),
        message.offset(),
        message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
    );
    inbound.key = message.key().map(<[u8]>::to_vec);
    inbound.timestamp = message
        .timestamp()
        .to_millis()
        .and_then(DateTime::<Utc>::from_timestamp_millis);
    inbound
}

impl std::fmt::Debug for PartitionedConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedConsumer")
            .field("brokers", &self.brokers)
            .field("topic", &self.topic)
            .field("channel_capacity", &self.channel_capacity)
            .field("partitions", &self.partitions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn partitioned_consumer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<PartitionedConsumer>();
    }

    #[tokio::test]
    async fn unreachable_broker_fails_connectivity_check() {
        let config = KafkaConfig::builder()
            .brokers("127.0.0.1:1")
            .group("stockflow-test")
            .topic("stock-updates")
            .connect_timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        let consumer = PartitionedConsumer::new(&config).unwrap();

        let err = consumer.verify_connectivity().await.unwrap_err();
        match err {
            ConsumerError::Connect { brokers, .. } => assert_eq!(brokers, "127.0.0.1:1"),
            other => unreachable!("unexpected error: {other}"),
        }
    }
}
