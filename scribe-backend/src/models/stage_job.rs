//! Remote stage job tracking

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status reported by a backend for one of its jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

/// What a stage contributes to the merged document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageRole {
    /// Supplies segments, text and language (speech recognition)
    Primary,
    /// Supplies speaker turns aligned onto the primary segments
    Attribution,
}

/// One submitted stage, held by the orchestrator for a single pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct StageJob {
    /// Identifier assigned by the backend at submit time
    pub stage_job_id: String,
    pub stage: String,
    pub role: StageRole,
    pub status: StageStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl StageJob {
    pub fn queued(stage_job_id: String, stage: String, role: StageRole) -> Self {
        Self {
            stage_job_id,
            stage,
            role,
            status: StageStatus::Queued,
            result: None,
            error: None,
        }
    }

    pub fn complete(&mut self, result: Value) {
        self.status = StageStatus::Completed;
        self.result = Some(result);
        self.error = None;
    }

    pub fn fail(&mut self, error: String) {
        self.status = StageStatus::Error;
        self.error = Some(error);
    }
}
