//! POST /api/analyze
//!
//! Multipart form with an optional `text` field and an optional `audio`
//! file (WAV). The pipeline runs on a blocking thread under the configured
//! request timeout.

use std::path::{Path, PathBuf};

use axum::extract::{Multipart, State};
use axum::Json;
use detox_core::{AnalysisRequest, AnalysisResponse, DetoxError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::ApiError;
use crate::AppState;

/// A spooled upload, removed when dropped.
#[derive(Debug)]
struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    fn write(dir: &Path, bytes: &[u8]) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("upload-{}.wav", Uuid::new_v4()));
        std::fs::write(&path, bytes)?;
        Ok(Self { path })
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove upload");
            }
        }
    }
}

pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let mut text: Option<String> = None;
    let mut upload: Option<TempUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed form: {e}")))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("text") => {
                text = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Unreadable text: {e}")))?,
                );
            }
            Some("audio") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Unreadable audio: {e}")))?;
                if !bytes.is_empty() {
                    let dir = state.upload_dir.clone();
                    let spooled =
                        tokio::task::spawn_blocking(move || TempUpload::write(&dir, &bytes))
                            .await
                            .map_err(|e| ApiError::Internal(e.to_string()))?
                            .map_err(|e| ApiError::Internal(format!("Could not store upload: {e}")))?;
                    upload = Some(spooled);
                }
            }
            other => debug!(field = ?other, "ignoring unknown form field"),
        }
    }

    let request = AnalysisRequest {
        text,
        audio: upload.as_ref().map(|u| u.path.clone()),
    };
    let pipeline = state.pipeline.clone();
    // The upload moves into the task so it outlives a timed-out request.
    let job = tokio::task::spawn_blocking(move || {
        let _upload = upload;
        pipeline.analyze(&request)
    });

    let response = match tokio::time::timeout(state.request_timeout, job).await {
        Err(_) => {
            warn!(timeout_secs = state.request_timeout.as_secs(), "analysis timed out");
            return Err(ApiError::Timeout(state.request_timeout));
        }
        Ok(Err(join)) => return Err(ApiError::Internal(join.to_string())),
        Ok(Ok(Err(DetoxError::Inference(msg)))) => return Err(ApiError::Inference(msg)),
        Ok(Ok(Err(other))) => return Err(ApiError::Internal(other.to_string())),
        Ok(Ok(Ok(response))) => response,
    };

    state.perf_metrics.lock().record(&response.timings);
    Ok(Json(response))
}
