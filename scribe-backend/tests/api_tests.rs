//! HTTP API integration tests
//!
//! Router exercised in-process with `oneshot`; backends are scripted.

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use helpers::*;
use scribe_backend::build_router;
use scribe_backend::models::{ResultDocument, Segment, StageRole};
use scribe_backend::services::ResultStore;

fn whisper_harness(healthy: bool) -> (Harness, std::sync::Arc<ScriptedClient>) {
    let whisper = ScriptedClient::new("whisper", Vec::new());
    whisper.set_healthy(healthy);
    let h = harness(vec![stage("whisper", 1.0, StageRole::Primary, whisper.clone())]);
    (h, whisper)
}

fn app(h: &Harness) -> Router {
    build_router(h.app_state())
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, body)
}

async fn send_json(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, method, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn save_transcript(h: &Harness, key: &str) {
    let document = ResultDocument::new(
        key,
        "hi".to_string(),
        vec![Segment::new(0.0, 5.0, "hi")],
        "en".to_string(),
    );
    h.store.save(key, document).await.unwrap();
}

#[tokio::test]
async fn liveness_reports_module() {
    let (h, _) = whisper_harness(true);

    let (status, body) = send_json(app(&h), "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "scribe-backend");
}

#[tokio::test]
async fn api_health_lists_backends() {
    let (h, _) = whisper_harness(false);

    let (status, body) = send_json(app(&h), "GET", "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"][0]["service"], "whisper");
    assert_eq!(body["services"][0]["healthy"], false);
}

#[tokio::test]
async fn process_with_backend_down_is_503_without_record() {
    // Given: whisper is unhealthy
    let (h, _) = whisper_harness(false);

    // When: POST /api/process/lecture.mp3
    let (status, body) = send_json(app(&h), "POST", "/api/process/lecture.mp3").await;

    // Then: 503 with per-backend detail and no job record
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "ServiceUnavailable");
    assert_eq!(body["details"]["whisper"]["status"], "unhealthy");
    assert!(h.registry.get("lecture.mp3").is_none());

    let (_, status_body) = send_json(app(&h), "GET", "/api/status/lecture.mp3").await;
    assert_eq!(status_body["state"], "not_started");
}

#[tokio::test]
async fn process_accepts_then_conflicts() {
    let (h, _) = whisper_harness(true);

    let (status, body) = send_json(app(&h), "POST", "/api/process/lecture.mp3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "started");

    // Nothing consumes the queue, so the job stays PROCESSING
    let (status, body) = send_json(app(&h), "POST", "/api/transcribe/lecture.mp3").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "AlreadyProcessing");

    let (_, record) = send_json(app(&h), "GET", "/api/status/lecture.mp3").await;
    assert_eq!(record["state"], "processing");
    assert_eq!(record["progress"], 0);
}

#[tokio::test]
async fn process_unknown_file_is_404() {
    let (h, whisper) = whisper_harness(true);

    let (status, body) = send_json(app(&h), "POST", "/api/process/missing.mp3").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
    assert_eq!(whisper.submissions(), 0);
}

#[tokio::test]
async fn traversal_keys_are_rejected() {
    let (h, _) = whisper_harness(true);

    for uri in [
        "/api/transcript/..%2Fsecret.json",
        "/api/status/..",
        "/api/process/..%5Clecture.mp3",
        "/api/audio/..%2F..%2Fetc%2Fpasswd",
    ] {
        let method = if uri.starts_with("/api/process") { "POST" } else { "GET" };
        let (status, _) = send(app(&h), method, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
    }
}

#[tokio::test]
async fn transcript_lookup() {
    let (h, _) = whisper_harness(true);

    let (status, _) = send(app(&h), "GET", "/api/transcript/lecture.mp3").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    save_transcript(&h, "lecture.mp3").await;

    let (status, body) = send_json(app(&h), "GET", "/api/transcript/lecture.mp3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["language"], "en");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["segments"][0]["text"], "hi");
}

#[tokio::test]
async fn status_falls_back_to_stored_transcript() {
    let (h, _) = whisper_harness(true);
    save_transcript(&h, "lecture.mp3").await;

    let (status, body) = send_json(app(&h), "GET", "/api/status/lecture.mp3").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "completed");
    assert_eq!(body["progress"], 100);
}

#[tokio::test]
async fn transcript_is_not_shared_across_extensions() {
    // Given: lecture.mp3 has a transcript and lecture.wav does not
    let (h, _) = whisper_harness(true);
    save_transcript(&h, "lecture.mp3").await;

    // Then: lecture.wav reports neither a transcript nor completion
    let (status, _) = send(app(&h), "GET", "/api/transcript/lecture.wav").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send_json(app(&h), "GET", "/api/status/lecture.wav").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "not_started");
}

#[tokio::test]
async fn audio_files_listing() {
    let (h, _) = whisper_harness(true);
    std::fs::write(h.audio_dir.path().join("talk.wav"), b"RIFF").unwrap();
    std::fs::write(h.audio_dir.path().join("readme.txt"), b"no").unwrap();
    std::fs::write(h.audio_dir.path().join("interview.flac"), b"fLaC").unwrap();
    save_transcript(&h, "talk.wav").await;
    h.registry.try_begin("interview.flac").unwrap();

    let (status, body) = send_json(app(&h), "GET", "/api/audio-files").await;

    assert_eq!(status, StatusCode::OK);
    let files = body["audio_files"].as_array().unwrap();
    assert_eq!(files.len(), 3);
    assert_eq!(files[0]["filename"], "interview.flac");
    assert_eq!(files[0]["status"], "processing");
    assert_eq!(files[0]["has_transcript"], false);
    assert_eq!(files[1]["filename"], "lecture.mp3");
    assert_eq!(files[1]["status"], "not_processed");
    assert_eq!(files[1]["has_transcript"], false);
    assert_eq!(files[1]["duration"], 184.0);
    assert_eq!(files[2]["filename"], "talk.wav");
    assert_eq!(files[2]["status"], "completed");
    assert_eq!(files[2]["size"], 4);
}

#[tokio::test]
async fn audio_is_streamed_with_mime_type() {
    let (h, _) = whisper_harness(true);

    let response = app(&h)
        .oneshot(
            Request::builder()
                .uri("/api/audio/lecture.mp3")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ID3 fake mp3 bytes");

    let (status, _) = send(app(&h), "GET", "/api/audio/missing.ogg").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
