use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use detox_core::DetoxError;
use uuid::Uuid;

use super::ApiError;
use crate::AppState;

/// GET /api/narration/:id
///
/// Streams the narration for one analysis. Each artifact can be fetched
/// once; later requests get 404.
pub async fn get_narration(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let store = state.pipeline.store().clone();
    let artifact = tokio::task::spawn_blocking(move || store.take(id))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(|e| match e {
            DetoxError::NarrationNotFound(_) => {
                ApiError::NotFound(format!("No narration for {id}"))
            }
            other => ApiError::Internal(other.to_string()),
        })?;

    Ok((
        [
            (header::CONTENT_TYPE, artifact.format.mime_type()),
            (header::CACHE_CONTROL, "no-store"),
        ],
        artifact.bytes,
    )
        .into_response())
}
