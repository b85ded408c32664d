//! HTTP surface for the Stockflow pipeline.
//!
//! The consumer loop owns all writes; this crate only reads. It shares the
//! consumer's [`InventoryEngine`](stockflow_runtime::InventoryEngine), message
//! buffer and readiness signal through [`AppState`].
//!
//! # Routes
//!
//! ```text
//! GET /inventory?product_id=&warehouse_id=   current stock (cache-aside)
//! GET /messages                              recent raw messages
//! GET /health                                liveness
//! GET /health/ready                          partitions assigned?
//! GET /metrics                               Prometheus exposition
//! ```
//!
//! # Example
//!
//! ```ignore
//! use stockflow_web::{AppState, router};
//!
//! let app = router(AppState::new(engine, buffer, ready));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod state;

use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

// Re-export key types for convenience
pub use error::AppError;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the application router with request tracing.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/inventory", get(handlers::get_inventory))
        .route("/messages", get(handlers::recent_messages))
        .route("/health", get(handlers::health_check))
        .route("/health/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
