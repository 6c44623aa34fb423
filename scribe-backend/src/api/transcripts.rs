//! Transcript retrieval

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use super::ensure_safe_key;
use crate::models::ResultDocument;
use crate::{ApiError, ApiResult, AppState};

/// GET /api/transcript/:key
pub async fn get_transcript(
    State(state): State<AppState>,
    Path(resource_key): Path<String>,
) -> ApiResult<Json<ResultDocument>> {
    ensure_safe_key(&resource_key)?;

    state
        .store
        .load(&resource_key)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Transcript not found: {}", resource_key)))
}

pub fn transcript_routes() -> Router<AppState> {
    Router::new().route("/api/transcript/:key", get(get_transcript))
}
