//! Stockflow server binary.
//!
//! Consumes stock updates from Kafka and serves the inventory read API.

use stockflow_runtime::metrics::MetricsRecorder;
use stockflow_server::{Application, Config, Resources};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockflow=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!(error = %e, "Failed to load .env file");
        }
    }

    info!("Starting Stockflow");

    let config = Config::from_env();
    info!(
        topic = %config.kafka.topic(),
        alert_topic = %config.kafka.alert_topic(),
        consumer_group = %config.kafka.group(),
        brokers = %config.kafka.broker_addresses(),
        prefix = %config.kafka.prefix,
        port = config.server.port,
        "Configuration loaded"
    );

    let mut metrics = MetricsRecorder::new();
    if let Err(e) = metrics.install() {
        warn!(error = %e, "Metrics disabled");
    }

    let resources = Resources::from_config(&config).await?;
    let mut state = resources.app_state();
    if let Some(handle) = metrics.handle() {
        state = state.with_metrics(handle.clone());
    }
    let app = stockflow_web::router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;

    Application::new(
        listener,
        app,
        resources.consumer,
        resources.worker_context,
        config.shutdown_timeout(),
    )
    .run()
    .await
}
