//! Prometheus scrape endpoint.

use crate::{error::AppError, state::AppState};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

/// Render metrics in Prometheus text exposition format.
///
/// ```text
/// GET /metrics
/// ```
///
/// # Errors
///
/// 503 when no recorder was installed for this process.
#[allow(clippy::unused_async)]
pub async fn metrics(State(state): State<AppState>) -> Result<Response, AppError> {
    let handle = state
        .metrics
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Metrics recorder not installed"))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response())
}
