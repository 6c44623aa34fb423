//! Audio file listing and streaming

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{header, HeaderValue},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use super::ensure_safe_key;
use crate::services::audio_library::mime_type;
use crate::{ApiResult, AppState};

/// One entry of the audio file listing
#[derive(Debug, Serialize)]
pub struct AudioFileInfo {
    pub filename: String,
    pub size: u64,
    pub duration: Option<f64>,
    /// `completed`, a live job state, or `not_processed`
    pub status: String,
    pub has_transcript: bool,
}

#[derive(Debug, Serialize)]
pub struct AudioFilesResponse {
    pub audio_files: Vec<AudioFileInfo>,
}

/// GET /api/audio-files
pub async fn list_audio_files(State(state): State<AppState>) -> ApiResult<Json<AudioFilesResponse>> {
    let files = state.library.list()?;
    let job_states: HashMap<String, &'static str> = state
        .registry
        .list()
        .into_iter()
        .map(|record| (record.resource_key, record.state.as_str()))
        .collect();

    let mut audio_files = Vec::with_capacity(files.len());
    for file in files {
        let has_transcript = state.store.exists(&file.filename).await;
        let status = if has_transcript {
            "completed"
        } else {
            job_states
                .get(&file.filename)
                .copied()
                .unwrap_or("not_processed")
        }
        .to_string();
        let duration = state.probe.duration_seconds(&file.path).await;

        audio_files.push(AudioFileInfo {
            filename: file.filename,
            size: file.size,
            duration,
            status,
            has_transcript,
        });
    }

    Ok(Json(AudioFilesResponse { audio_files }))
}

/// GET /api/audio/:filename
///
/// Serves the file with range support and a MIME type from its extension.
pub async fn stream_audio(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    ensure_safe_key(&filename)?;
    let path = state.library.resolve(&filename)?;

    let response = ServeFile::new(&path)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});
    let mut response = response.map(Body::new);

    if response.status().is_success() {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(mime_type(&filename)),
        );
    }

    Ok(response)
}

pub fn audio_routes() -> Router<AppState> {
    Router::new()
        .route("/api/audio-files", get(list_audio_files))
        .route("/api/audio/:filename", get(stream_audio))
}
