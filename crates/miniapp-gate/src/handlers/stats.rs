//! Usage statistics handler.

use crate::observability::counters::UsageSnapshot;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /api/v1/stats
///
/// Snapshot of auth decisions and group popularity since process start.
#[instrument(skip_all, name = "gate.handlers.stats")]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<UsageSnapshot> {
    Json(state.counters.snapshot())
}
