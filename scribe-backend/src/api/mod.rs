//! HTTP API handlers for scribe-backend
//!
//! REST endpoints for audio files, transcripts and job control, plus an SSE
//! stream of job lifecycle events.

pub mod audio;
pub mod health;
pub mod jobs;
pub mod sse;
pub mod transcripts;

pub use audio::audio_routes;
pub use health::health_routes;
pub use jobs::job_routes;
pub use sse::{event_routes, event_stream};
pub use transcripts::transcript_routes;

use crate::services::audio_library::is_safe_key;
use crate::ApiError;

/// Reject keys that could escape the audio or transcript directory
pub(crate) fn ensure_safe_key(key: &str) -> Result<(), ApiError> {
    if is_safe_key(key) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!("Invalid file name: {}", key)))
    }
}
