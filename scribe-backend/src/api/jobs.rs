//! Job control endpoints
//!
//! Submission is fire-and-forget: the handler admits the job and returns,
//! clients follow progress through `/api/status/:key` or `/api/events`.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::ensure_safe_key;
use crate::models::JobRecord;
use crate::{ApiResult, AppState};

/// Response for an accepted submission
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub status: String,
    pub resource_key: String,
    pub message: String,
}

/// POST /api/process/:key (alias POST /api/transcribe/:key)
///
/// 200 when admitted, 404 for an unknown file, 409 while a job for the key
/// is running, 503 with per-backend detail when a backend is down.
pub async fn process(
    State(state): State<AppState>,
    Path(resource_key): Path<String>,
) -> ApiResult<Json<ProcessResponse>> {
    ensure_safe_key(&resource_key)?;
    state.library.resolve(&resource_key)?;

    state.orchestrator.accept(&resource_key).await?;

    Ok(Json(ProcessResponse {
        status: "started".to_string(),
        resource_key,
        message: "Transcription started in background".to_string(),
    }))
}

/// GET /api/status/:key
///
/// Live record when one exists, else COMPLETED for a transcript already on
/// disk, else NOT_STARTED.
pub async fn status(
    State(state): State<AppState>,
    Path(resource_key): Path<String>,
) -> ApiResult<Json<JobRecord>> {
    ensure_safe_key(&resource_key)?;

    if let Some(record) = state.registry.get(&resource_key) {
        return Ok(Json(record));
    }

    let record = match state.store.load(&resource_key).await? {
        Some(document) => JobRecord::completed_from(&document),
        None => JobRecord::not_started(resource_key),
    };
    Ok(Json(record))
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/api/process/:key", post(process))
        .route("/api/transcribe/:key", post(process))
        .route("/api/status/:key", get(status))
}
