//! Recent-message inspection.

use crate::state::AppState;
use axum::{Json, extract::State};
use stockflow_core::message::BufferedMessage;

/// Messages currently held in the buffer, oldest first.
///
/// ```text
/// GET /messages
/// ```
#[allow(clippy::unused_async)]
pub async fn recent_messages(State(state): State<AppState>) -> Json<Vec<BufferedMessage>> {
    Json(state.buffer.snapshot())
}
