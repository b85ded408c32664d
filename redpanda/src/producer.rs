//! Low-stock alert publishing.

use crate::config::KafkaConfig;
use crate::ConsumerError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use stockflow_core::alert::{AlertError, AlertSink, LowStockAlert};

/// [`AlertSink`] that writes JSON alerts to a Kafka topic.
///
/// Alerts carry no key, so the partitioner spreads them across partitions.
///
/// # Example
///
/// ```no_run
/// use stockflow_redpanda::{KafkaAlertPublisher, KafkaConfig};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = KafkaConfig::builder()
///     .brokers("localhost:9092")
///     .group("stockflow")
///     .topic("stock-updates")
///     .build()?;
/// let publisher = KafkaAlertPublisher::new(&config, "low-stock-alerts")?;
/// # Ok(())
/// # }
/// ```
pub struct KafkaAlertPublisher {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaAlertPublisher {
    /// Create a publisher writing to `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Producer`] if the producer cannot be created.
    pub fn new(config: &KafkaConfig, topic: impl Into<String>) -> Result<Self, ConsumerError> {
        let producer: FutureProducer = config
            .producer_client_config()
            .create()
            .map_err(|e| ConsumerError::Producer(e.to_string()))?;
        let topic = topic.into();

        tracing::info!(
            brokers = %config.brokers(),
            topic = %topic,
            "Alert publisher created"
        );

        Ok(Self {
            producer,
            topic,
            timeout: config.producer_timeout(),
        })
    }

    /// Topic alerts are written to.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl AlertSink for KafkaAlertPublisher {
    fn publish(
        &self,
        alert: &LowStockAlert,
    ) -> Pin<Box<dyn Future<Output = Result<(), AlertError>> + Send + '_>> {
        let alert = *alert;

        Box::pin(async move {
            let payload = alert.to_json()?;
            let record = FutureRecord::<(), [u8]>::to(&self.topic).payload(&payload);

            match self
                .producer
                .send(record, Timeout::After(self.timeout))
                .await
            {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %self.topic,
                        partition = partition,
                        offset = offset,
                        product_id = alert.product_id,
                        warehouse_id = alert.warehouse_id,
                        "Alert published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %self.topic,
                        error = %kafka_error,
                        "Failed to publish alert"
                    );
                    Err(AlertError::PublishFailed {
                        topic: self.topic.clone(),
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }
}

impl std::fmt::Debug for KafkaAlertPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaAlertPublisher")
            .field("topic", &self.topic)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_publisher_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<KafkaAlertPublisher>();
        assert_sync::<KafkaAlertPublisher>();
    }
}
