use axum::{extract::State, Json};

use crate::state::PerfSnapshot;
use crate::AppState;

/// GET /api/diagnostics
///
/// Pipeline counters, pending narration artifacts and per-stage latency.
pub async fn get_diagnostics(State(state): State<AppState>) -> Json<PerfSnapshot> {
    Json(state.perf_snapshot())
}
