//! Persisted transcript document

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Document status; only successful runs are ever written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Completed,
}

/// One timed transcript segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Seconds from start of audio
    pub start: f64,
    pub end: f64,
    pub text: String,
    /// Speaker label from the attribution stage, if one ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            speaker: None,
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Merged result of one successful pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    pub resource_key: String,
    /// Assigned by the ResultStore at save time
    pub created_at: DateTime<Utc>,
    pub status: DocumentStatus,
    /// Full transcript text
    #[serde(default)]
    pub text: String,
    pub segments: Vec<Segment>,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    pub processing_time_seconds: f64,
}

impl ResultDocument {
    pub fn new(
        resource_key: impl Into<String>,
        text: String,
        segments: Vec<Segment>,
        language: String,
    ) -> Self {
        Self {
            resource_key: resource_key.into(),
            created_at: Utc::now(),
            status: DocumentStatus::Completed,
            text,
            segments,
            language,
            duration_seconds: None,
            processing_time_seconds: 0.0,
        }
    }

    /// Speaker labels in order of first appearance
    pub fn speakers(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for speaker in self.segments.iter().filter_map(|s| s.speaker.as_deref()) {
            if !seen.contains(&speaker) {
                seen.push(speaker);
            }
        }
        seen
    }
}
