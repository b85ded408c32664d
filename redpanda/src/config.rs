//! Broker connection settings.

use crate::ConsumerError;
use rdkafka::config::ClientConfig;
use std::time::Duration;

const DEFAULT_AUTO_COMMIT_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_PRODUCER_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REVOKE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings shared by the consumer and the alert producer.
///
/// # Example
///
/// ```
/// use stockflow_redpanda::KafkaConfig;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = KafkaConfig::builder()
///     .brokers("localhost:9092")
///     .group("stockflow")
///     .topic("stock-updates")
///     .alert_topic("low-stock-alerts")
///     .auto_commit_interval(Duration::from_millis(500))
///     .build()?;
/// assert_eq!(config.topic(), "stock-updates");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    brokers: String,
    group: String,
    topic: String,
    alert_topic: Option<String>,
    client_id: String,
    auto_commit_interval: Duration,
    auto_offset_reset: String,
    channel_capacity: usize,
    producer_timeout: Duration,
    revoke_timeout: Duration,
    connect_timeout: Duration,
    security_protocol: Option<String>,
    ssl_ca_pem: Option<String>,
    ssl_certificate_pem: Option<String>,
    ssl_key_pem: Option<String>,
}

impl KafkaConfig {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> KafkaConfigBuilder {
        KafkaConfigBuilder::default()
    }

    /// Comma-separated bootstrap servers.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }

    /// Consumer group id.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Inbound stock-update topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Outbound alert topic, if alerts are enabled.
    #[must_use]
    pub fn alert_topic(&self) -> Option<&str> {
        self.alert_topic.as_deref()
    }

    /// Capacity of each partition worker's channel.
    #[must_use]
    pub const fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Delivery timeout for alerts.
    #[must_use]
    pub const fn producer_timeout(&self) -> Duration {
        self.producer_timeout
    }

    /// How long a rebalance waits for revoked partitions' workers.
    #[must_use]
    pub const fn revoke_timeout(&self) -> Duration {
        self.revoke_timeout
    }

    /// Budget for the startup broker metadata request.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    fn base_client_config(&self, client_suffix: &str) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("client.id", format!("{}/{client_suffix}", self.client_id));
        if let Some(protocol) = &self.security_protocol {
            config.set("security.protocol", protocol);
        }
        if let Some(pem) = &self.ssl_ca_pem {
            config.set("ssl.ca.pem", pem);
        }
        if let Some(pem) = &self.ssl_certificate_pem {
            config.set("ssl.certificate.pem", pem);
        }
        if let Some(pem) = &self.ssl_key_pem {
            config.set("ssl.key.pem", pem);
        }
        config
    }

    /// rdkafka settings for the consumer-group member.
    #[must_use]
    pub fn consumer_client_config(&self) -> ClientConfig {
        let mut config = self.base_client_config("consumer");
        config
            .set("group.id", &self.group)
            .set("enable.auto.commit", "true")
            .set(
                "auto.commit.interval.ms",
                self.auto_commit_interval.as_millis().to_string(),
            )
            .set("enable.auto.offset.store", "false")
            .set("partition.assignment.strategy", "roundrobin")
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("enable.partition.eof", "false");
        config
    }

    /// rdkafka settings for the alert producer.
    #[must_use]
    pub fn producer_client_config(&self) -> ClientConfig {
        let mut config = self.base_client_config("producer");
        config
            .set("acks", "all")
            .set(
                "message.timeout.ms",
                self.producer_timeout.as_millis().to_string(),
            );
        config
    }
}

/// Builder for [`KafkaConfig`].
#[derive(Debug, Default, Clone)]
pub struct KafkaConfigBuilder {
    brokers: Option<String>,
    group: Option<String>,
    topic: Option<String>,
    alert_topic: Option<String>,
    client_id: Option<String>,
    auto_commit_interval: Option<Duration>,
    auto_offset_reset: Option<String>,
    channel_capacity: Option<usize>,
    producer_timeout: Option<Duration>,
    revoke_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    security_protocol: Option<String>,
    ssl_ca_pem: Option<String>,
    ssl_certificate_pem: Option<String>,
    ssl_key_pem: Option<String>,
}

impl KafkaConfigBuilder {
    /// Set the broker addresses (comma-separated).
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Set the consumer group id.
    #[must_use]
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Set the inbound topic.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set the alert topic.
    #[must_use]
    pub fn alert_topic(mut self, topic: impl Into<String>) -> Self {
        self.alert_topic = Some(topic.into());
        self
    }

    /// Set the client id prefix (default: `stockflow`).
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set how often stored offsets are committed (default: 1 second).
    #[must_use]
    pub const fn auto_commit_interval(mut self, interval: Duration) -> Self {
        self.auto_commit_interval = Some(interval);
        self
    }

    /// Set where a group without committed offsets starts (default: `earliest`).
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Set the per-partition channel capacity (default: 256).
    #[must_use]
    pub const fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = Some(capacity);
        self
    }

    /// Set the alert delivery timeout (default: 5 seconds).
    #[must_use]
    pub const fn producer_timeout(mut self, timeout: Duration) -> Self {
        self.producer_timeout = Some(timeout);
        self
    }

    /// Set how long a rebalance waits for revoked workers (default: 30 seconds).
    #[must_use]
    pub const fn revoke_timeout(mut self, timeout: Duration) -> Self {
        self.revoke_timeout = Some(timeout);
        self
    }

    /// Set the startup connectivity check budget (default: 10 seconds).
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set `security.protocol` (e.g. `ssl`, `plaintext`).
    #[must_use]
    pub fn security_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.security_protocol = Some(protocol.into());
        self
    }

    /// Set PEM-encoded TLS material: trusted CA, client certificate, client key.
    #[must_use]
    pub fn ssl_pem(
        mut self,
        ca: Option<String>,
        certificate: Option<String>,
        key: Option<String>,
    ) -> Self {
        self.ssl_ca_pem = ca;
        self.ssl_certificate_pem = certificate;
        self.ssl_key_pem = key;
        self
    }

    /// Build the [`KafkaConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConsumerError::Config`] if brokers, group or topic are
    /// missing or empty, or the channel capacity is zero.
    pub fn build(self) -> Result<KafkaConfig, ConsumerError> {
        let required = |value: Option<String>, name: &str| {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConsumerError::Config(format!("{name} not configured")))
        };
        let brokers = required(self.brokers, "Brokers")?;
        let group = required(self.group, "Consumer group")?;
        let topic = required(self.topic, "Topic")?;

        let channel_capacity = self.channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        if channel_capacity == 0 {
            return Err(ConsumerError::Config(
                "Channel capacity must be greater than 0".to_string(),
            ));
        }

        Ok(KafkaConfig {
            brokers,
            group,
            topic,
            alert_topic: self.alert_topic.filter(|t| !t.trim().is_empty()),
            client_id: self.client_id.unwrap_or_else(|| "stockflow".to_string()),
            auto_commit_interval: self
                .auto_commit_interval
                .unwrap_or(DEFAULT_AUTO_COMMIT_INTERVAL),
            auto_offset_reset: self
                .auto_offset_reset
                .unwrap_or_else(|| "earliest".to_string()),
            channel_capacity,
            producer_timeout: self.producer_timeout.unwrap_or(DEFAULT_PRODUCER_TIMEOUT),
            revoke_timeout: self.revoke_timeout.unwrap_or(DEFAULT_REVOKE_TIMEOUT),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            security_protocol: self.security_protocol,
            ssl_ca_pem: self.ssl_ca_pem,
            ssl_certificate_pem: self.ssl_certificate_pem,
            ssl_key_pem: self.ssl_key_pem,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> KafkaConfig {
        KafkaConfig::builder()
            .brokers("localhost:9092")
            .group("stockflow")
            .topic("stock-updates")
            .build()
            .unwrap()
    }

    #[test]
    fn consumer_stores_offsets_only_when_marked() {
        let client = config().consumer_client_config();
        assert_eq!(client.get("enable.auto.commit"), Some("true"));
        assert_eq!(client.get("enable.auto.offset.store"), Some("false"));
        assert_eq!(client.get("auto.commit.interval.ms"), Some("1000"));
        assert_eq!(client.get("partition.assignment.strategy"), Some("roundrobin"));
        assert_eq!(client.get("group.id"), Some("stockflow"));
    }

    #[test]
    fn tls_material_is_passed_through() {
        let client = KafkaConfig::builder()
            .brokers("b:9096")
            .group("g")
            .topic("t")
            .security_protocol("ssl")
            .ssl_pem(Some("CA".to_string()), Some("CERT".to_string()), None)
            .build()
            .unwrap()
            .producer_client_config();
        assert_eq!(client.get("security.protocol"), Some("ssl"));
        assert_eq!(client.get("ssl.ca.pem"), Some("CA"));
        assert_eq!(client.get("ssl.certificate.pem"), Some("CERT"));
        assert_eq!(client.get("ssl.key.pem"), None);
    }

    #[test]
    fn missing_required_settings_are_rejected() {
        let err = KafkaConfig::builder().group("g").topic("t").build().unwrap_err();
        assert_eq!(err, ConsumerError::Config("Brokers not configured".to_string()));

        let err = KafkaConfig::builder()
            .brokers("b")
            .group(" ")
            .topic("t")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConsumerError::Config(_)));
    }

    #[test]
    fn zero_channel_capacity_is_rejected() {
        let err = KafkaConfig::builder()
            .brokers("b")
            .group("g")
            .topic("t")
            .channel_capacity(0)
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn timeouts_default_and_override() {
        let defaults = config();
        assert_eq!(defaults.revoke_timeout(), Duration::from_secs(30));
        assert_eq!(defaults.connect_timeout(), Duration::from_secs(10));

        let tuned = KafkaConfig::builder()
            .brokers("b")
            .group("g")
            .topic("t")
            .revoke_timeout(Duration::from_secs(3))
            .connect_timeout(Duration::from_millis(250))
            .build()
            .unwrap();
        assert_eq!(tuned.revoke_timeout(), Duration::from_secs(3));
        assert_eq!(tuned.connect_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn blank_alert_topic_is_unset() {
        let config = KafkaConfig::builder()
            .brokers("b")
            .group("g")
            .topic("t")
            .alert_topic("")
            .build()
            .unwrap();
        assert_eq!(config.alert_topic(), None);
    }
}
