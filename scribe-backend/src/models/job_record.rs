//! Job lifecycle record
//!
//! State progression for one record instance:
//! NOT_STARTED → PROCESSING → COMPLETED | ERROR
//!
//! Terminal records are only ever replaced wholesale by a later resubmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ResultDocument;

/// Job state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// No job has been accepted for the resource
    NotStarted,
    /// Pipeline running
    Processing,
    /// Result persisted
    Completed,
    /// Pipeline failed; `error` carries the detail
    Error,
}

impl JobState {
    /// COMPLETED and ERROR admit no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Error)
    }

    /// Wire name, as serialized
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::NotStarted => "not_started",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Error => "error",
        }
    }
}

/// Latest known progress of one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageProgress {
    /// Stage name (e.g. "whisper")
    pub stage: String,
    /// Share of the overall progress, weights of all stages sum to 1.0
    pub weight: f64,
    /// 0-100
    pub progress: u8,
}

/// Summary of the persisted result, attached on COMPLETED
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRef {
    /// Creation timestamp assigned by the ResultStore
    pub created_at: DateTime<Utc>,
    pub language: String,
    pub segment_count: usize,
    pub processing_time_seconds: f64,
}

impl From<&ResultDocument> for ResultRef {
    fn from(document: &ResultDocument) -> Self {
        Self {
            created_at: document.created_at,
            language: document.language.clone(),
            segment_count: document.segments.len(),
            processing_time_seconds: document.processing_time_seconds,
        }
    }
}

/// Lifecycle record for one resource key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub resource_key: String,
    pub state: JobState,
    /// Weighted overall progress (0-100), never decreases while PROCESSING
    pub progress: u8,
    /// Per-stage progress in declared stage order
    pub stages: Vec<StageProgress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultRef>,
}

impl JobRecord {
    /// Snapshot for a resource that has never been submitted
    pub fn not_started(resource_key: impl Into<String>) -> Self {
        Self {
            resource_key: resource_key.into(),
            state: JobState::NotStarted,
            progress: 0,
            stages: Vec::new(),
            error: None,
            started_at: None,
            completed_at: None,
            result: None,
        }
    }

    /// Fresh PROCESSING record with every stage at zero
    pub fn processing(resource_key: impl Into<String>, stage_weights: &[(String, f64)]) -> Self {
        Self {
            resource_key: resource_key.into(),
            state: JobState::Processing,
            progress: 0,
            stages: stage_weights
                .iter()
                .map(|(stage, weight)| StageProgress {
                    stage: stage.clone(),
                    weight: *weight,
                    progress: 0,
                })
                .collect(),
            error: None,
            started_at: Some(Utc::now()),
            completed_at: None,
            result: None,
        }
    }

    /// Snapshot for a resource whose transcript exists on disk but which has
    /// no record in this process (e.g. produced before a restart)
    pub fn completed_from(document: &ResultDocument) -> Self {
        Self {
            resource_key: document.resource_key.clone(),
            state: JobState::Completed,
            progress: 100,
            stages: Vec::new(),
            error: None,
            started_at: None,
            completed_at: Some(document.created_at),
            result: Some(ResultRef::from(document)),
        }
    }

    /// (weight, progress) pairs in declared order
    pub fn weighted_progress(&self) -> Vec<(f64, u8)> {
        self.stages.iter().map(|s| (s.weight, s.progress)).collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
