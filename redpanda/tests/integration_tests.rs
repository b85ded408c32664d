//! Integration tests for [`PartitionedConsumer`] and [`KafkaAlertPublisher`]
//! against a real Kafka instance.
//!
//! These tests use testcontainers to spin up Kafka and validate:
//! - Readiness after the first partition assignment
//! - Stock updates flowing through to the store
//! - Failed messages left unmarked while later ones are processed
//! - Alerts written to the alert topic
//!
//! # Running These Tests
//!
//! These tests are marked as `#[ignore]` by default because they:
//! - Require Docker to be running (for testcontainers)
//! - Take 15-60 seconds per test to spin up Kafka
//!
//! To run explicitly:
//! ```bash
//! cargo test -p stockflow-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::sync::Arc;
use std::time::Duration;
use stockflow_core::alert::{AlertSink, LowStockAlert};
use stockflow_core::inventory::{InventoryKey, InventoryRecord};
use stockflow_redpanda::{KafkaAlertPublisher, KafkaConfig, PartitionedConsumer};
use stockflow_runtime::{
    AlertEmitter, CacheAside, InventoryEngine, MessageBuffer, StockUpdateHandler, WorkerContext,
};
use stockflow_testing::{InMemoryCache, InMemoryInventoryStore, RecordingAlertSink, test_clock};
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};
use tokio::sync::watch;

async fn start_kafka() -> (testcontainers::ContainerAsync<Kafka>, String) {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");
    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    (kafka, format!("{host}:{port}"))
}

fn producer(brokers: &str) -> FutureProducer {
    ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("message.timeout.ms", "5000")
        .create()
        .expect("Failed to create producer")
}

/// Publish until the topic has been auto-created and accepts writes.
async fn produce(producer: &FutureProducer, topic: &str, payload: &str) {
    for attempt in 1..=60 {
        let record = FutureRecord::<(), str>::to(topic).payload(payload);
        if producer
            .send(record, Timeout::After(Duration::from_secs(5)))
            .await
            .is_ok()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(attempt != 60, "Failed to produce to {topic}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore]
async fn test_updates_flow_through_partitioned_consumer() {
    let (_kafka, brokers) = start_kafka().await;
    let producer = producer(&brokers);

    let topic = "stock-updates";
    produce(&producer, topic, r#"{"product_id":2,"warehouse_id":1,"stock_delta":-3}"#).await;
    produce(&producer, topic, "not json").await;
    produce(&producer, topic, r#"{"product_id":2,"warehouse_id":1,"stock_delta":1}"#).await;

    let store = InMemoryInventoryStore::new().with_records([InventoryRecord {
        product_id: 2,
        warehouse_id: 1,
        stock_level: 10,
        alert_threshold: 8,
    }]);
    let alerts = RecordingAlertSink::new();
    let engine = InventoryEngine::new(
        Arc::new(store.clone()),
        CacheAside::new(Arc::new(InMemoryCache::new())),
    );
    let handler = StockUpdateHandler::new(engine, AlertEmitter::new(Arc::new(alerts.clone())));

    let config = KafkaConfig::builder()
        .brokers(&brokers)
        .group("stockflow-it")
        .topic(topic)
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to build config");
    let consumer = PartitionedConsumer::new(&config).expect("Failed to create consumer");
    consumer
        .verify_connectivity()
        .await
        .expect("Kafka should be reachable");
    let ready = consumer.ready();
    let buffer = Arc::new(MessageBuffer::new(10));
    let context = WorkerContext {
        buffer: Arc::clone(&buffer),
        handler: Arc::new(handler),
        offsets: Arc::new(consumer.offset_marker()),
        ready: ready.clone(),
        clock: Arc::new(test_clock()),
    };

    let (stop, shutdown) = watch::channel(false);
    let dispatcher = tokio::spawn(consumer.run(context, shutdown));

    tokio::time::timeout(Duration::from_secs(30), async {
        while buffer.len() < 3 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await
    .expect("Timeout waiting for messages");

    assert!(ready.is_ready());
    assert_eq!(store.record(InventoryKey::new(2, 1)).unwrap().stock_level, 8);
    assert_eq!(store.stock_log().len(), 2);
    assert_eq!(alerts.alerts().len(), 1);

    stop.send(true).expect("Dispatcher gone");
    let reports = dispatcher.await.expect("Dispatcher panicked");
    let handled: u64 = reports.iter().map(|r| r.handled).sum();
    let failed: u64 = reports.iter().map(|r| r.failed).sum();
    assert_eq!(handled, 2);
    assert_eq!(failed, 1);
}

#[tokio::test]
#[ignore]
async fn test_alert_publisher_writes_json() {
    let (_kafka, brokers) = start_kafka().await;
    let topic = "low-stock-alerts";
    produce(&producer(&brokers), topic, "warmup").await;

    let config = KafkaConfig::builder()
        .brokers(&brokers)
        .group("stockflow-alerts-it")
        .topic("unused")
        .build()
        .expect("Failed to build config");
    let publisher = KafkaAlertPublisher::new(&config, topic).expect("Failed to create publisher");
    let alert = LowStockAlert {
        product_id: 2,
        warehouse_id: 1,
        current_stock: 7,
        threshold: 8,
    };
    publisher.publish(&alert).await.expect("Failed to publish");

    let reader: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &brokers)
        .set("group.id", "alert-reader")
        .set("auto.offset.reset", "earliest")
        .create()
        .expect("Failed to create reader");
    reader.subscribe(&[topic]).expect("Failed to subscribe");

    let received = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let message = reader.recv().await.expect("Failed to receive");
            if let Some(Ok(parsed)) = message
                .payload()
                .map(serde_json::from_slice::<LowStockAlert>)
            {
                return parsed;
            }
        }
    })
    .await
    .expect("Timeout waiting for alert");

    assert_eq!(received, alert);
}
