//! detox-app: browser front end and HTTP API over the decision pipeline.

pub mod api;
pub mod settings;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Largest accepted upload (about five minutes of 16-bit 48 kHz stereo).
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::serve_index))
        .route("/static/app.js", get(api::serve_app_js))
        .route(
            "/api/analyze",
            post(api::analyze).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/narration/:id", get(api::get_narration))
        .route("/api/diagnostics", get(api::get_diagnostics))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
