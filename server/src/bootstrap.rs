//! Resource setup.
//!
//! Connects every external system named in [`Config`] and wires the pipeline
//! components together. Any failure here is fatal to the process.

use crate::config::Config;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use stockflow_core::environment::SystemClock;
use stockflow_postgres::{PgStoreOptions, PostgresInventoryStore};
use stockflow_redis::RedisInventoryCache;
use stockflow_redpanda::{ConsumerError, KafkaAlertPublisher, KafkaConfig, PartitionedConsumer};
use stockflow_runtime::{
    AlertEmitter, CacheAside, InventoryEngine, MessageBuffer, StockUpdateHandler, WorkerContext,
};
use stockflow_web::AppState;
use tracing::info;

/// Everything the application needs to run.
pub struct Resources {
    /// Shared engine for the consumer and the read API
    pub engine: InventoryEngine,
    /// Recent-message buffer
    pub buffer: Arc<MessageBuffer>,
    /// Kafka consumer-group member
    pub consumer: PartitionedConsumer,
    /// Collaborators handed to every partition worker
    pub worker_context: WorkerContext,
}

impl Resources {
    /// Connect the store, cache and broker and wire the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if any connection cannot be established (including
    /// an unreachable Kafka cluster), if migrations fail, or if the Kafka
    /// settings are invalid.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        info!("Connecting to PostgreSQL...");
        let options = PgStoreOptions {
            max_connections: config.postgres.max_connections,
            acquire_timeout: Duration::from_secs(config.postgres.acquire_timeout),
            statement_timeout: (config.postgres.statement_timeout > 0)
                .then(|| Duration::from_secs(config.postgres.statement_timeout)),
        };
        let store = PostgresInventoryStore::connect(&config.postgres.url, &options)
            .await
            .context("Failed to connect to PostgreSQL")?;
        if config.postgres.run_migrations {
            info!("Running inventory migrations...");
            store.migrate().await.context("Failed to run migrations")?;
        }

        info!("Connecting to Redis...");
        let cache = RedisInventoryCache::new(&config.redis.url)
            .await
            .context("Failed to connect to Redis")?;

        let engine = InventoryEngine::new(Arc::new(store), CacheAside::new(Arc::new(cache)));

        info!("Connecting to Kafka...");
        let kafka = config
            .kafka
            .client_config()
            .context("Invalid Kafka configuration")?;
        let topic = alert_topic(&kafka).context("Invalid Kafka configuration")?;
        let publisher = KafkaAlertPublisher::new(&kafka, topic)
            .context("Failed to create alert producer")?;
        let consumer =
            PartitionedConsumer::new(&kafka).context("Failed to create Kafka consumer")?;
        consumer
            .verify_connectivity()
            .await
            .context("Failed to connect to Kafka")?;

        let buffer = Arc::new(MessageBuffer::new(config.pipeline.buffer_capacity));
        let handler = StockUpdateHandler::new(engine.clone(), AlertEmitter::new(Arc::new(publisher)));
        let worker_context = WorkerContext {
            buffer: Arc::clone(&buffer),
            handler: Arc::new(handler),
            offsets: Arc::new(consumer.offset_marker()),
            ready: consumer.ready(),
            clock: Arc::new(SystemClock),
        };

        info!(
            topic = %kafka.topic(),
            group = %kafka.group(),
            brokers = %kafka.brokers(),
            buffer_capacity = config.pipeline.buffer_capacity,
            "Resources initialized"
        );

        Ok(Self {
            engine,
            buffer,
            consumer,
            worker_context,
        })
    }

    /// HTTP state sharing this pipeline's engine, buffer and readiness.
    #[must_use]
    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.engine.clone(),
            Arc::clone(&self.buffer),
            self.consumer.ready(),
        )
    }
}

/// Alerts are part of the pipeline, so a missing topic is a startup error.
fn alert_topic(kafka: &KafkaConfig) -> Result<&str, ConsumerError> {
    kafka
        .alert_topic()
        .ok_or_else(|| ConsumerError::Config("Alert topic not configured".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::collections::HashMap;

    fn kafka_config(vars: &[(&str, &str)]) -> KafkaConfig {
        let vars: HashMap<&str, &str> = vars.iter().copied().collect();
        Config::from_lookup(|key| vars.get(key).map(|v| (*v).to_string()))
            .kafka
            .client_config()
            .unwrap()
    }

    #[test]
    fn alert_topic_comes_from_client_config() {
        let kafka = kafka_config(&[("KAFKA_PREFIX", "t1."), ("KAFKA_ALERT_TOPIC", "alerts")]);
        assert_eq!(alert_topic(&kafka).unwrap(), "t1.alerts");
    }

    #[test]
    fn blank_alert_topic_is_rejected() {
        let kafka = kafka_config(&[("KAFKA_PREFIX", "t1."), ("KAFKA_ALERT_TOPIC", " ")]);
        assert_eq!(
            alert_topic(&kafka).unwrap_err(),
            ConsumerError::Config("Alert topic not configured".to_string())
        );
    }
}
