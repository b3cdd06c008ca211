//! HTTP handlers.

pub mod analyze;
pub mod diagnostics;
pub mod health;
pub mod narration;
pub mod ui;

pub use analyze::analyze;
pub use diagnostics::get_diagnostics;
pub use health::health_routes;
pub use narration::get_narration;
pub use ui::{serve_app_js, serve_index};

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Errors surfaced to HTTP clients as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Inference(String),
    Timeout(Duration),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Inference(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Classification failed: {msg}"),
            ),
            ApiError::Timeout(after) => (
                StatusCode::GATEWAY_TIMEOUT,
                format!("Analysis did not finish within {}s", after.as_secs()),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
