//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::{error::AppError, state::AppState};
use axum::{extract::State, http::StatusCode};

/// Simple health check endpoint (for basic liveness).
///
/// Returns 200 OK to indicate the service is running.
/// This endpoint does NOT check dependencies (database, broker, etc.).
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness check.
///
/// # Status Codes
///
/// - 200 OK: the consumer group has been assigned partitions
/// - 503 Service Unavailable: still waiting for the first assignment
///
/// # Endpoint
///
/// ```text
/// GET /health/ready
/// ```
#[allow(clippy::unused_async)]
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<(StatusCode, &'static str), AppError> {
    if state.ready.is_ready() {
        Ok((StatusCode::OK, "ready"))
    } else {
        Err(AppError::unavailable("Consumer has no partition assignment yet"))
    }
}
