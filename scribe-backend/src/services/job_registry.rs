//! In-memory job registry
//!
//! Sole owner of every JobRecord. All mutations run inside one registry-wide
//! write section, so `try_begin` dedups concurrent submissions for the same
//! key without further coordination. Critical sections never await.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use thiserror::Error;

use crate::models::{JobRecord, JobState, ResultDocument, ResultRef};
use crate::services::progress::aggregate;

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A job for the key is already PROCESSING
    #[error("Already processing {0}")]
    Conflict(String),

    #[error("No job record for {0}")]
    NotFound(String),

    /// Operation not allowed from the record's current state
    #[error("Job for {resource_key} is {state:?}, cannot {operation}")]
    InvalidTransition {
        resource_key: String,
        state: JobState,
        operation: &'static str,
    },

    #[error("Job for {resource_key} has no stage named {stage}")]
    UnknownStage { resource_key: String, stage: String },
}

/// Concurrency-safe lifecycle owner for job records
pub struct JobRegistry {
    /// Stage names and weights in declared order, copied into every new record
    stage_weights: Vec<(String, f64)>,
    records: RwLock<HashMap<String, JobRecord>>,
}

impl JobRegistry {
    pub fn new(stage_weights: Vec<(String, f64)>) -> Self {
        Self {
            stage_weights,
            records: RwLock::new(HashMap::new()),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, JobRecord>> {
        match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, JobRecord>> {
        match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Start a job for `resource_key`
    ///
    /// Returns `Conflict` without touching the existing record when one is
    /// PROCESSING. Otherwise replaces any prior (terminal) record with a fresh
    /// PROCESSING one.
    pub fn try_begin(&self, resource_key: &str) -> Result<JobRecord, RegistryError> {
        let mut records = self.write();

        if let Some(existing) = records.get(resource_key) {
            if existing.state == JobState::Processing {
                return Err(RegistryError::Conflict(resource_key.to_string()));
            }
            tracing::debug!(
                resource_key,
                previous_state = ?existing.state,
                "Replacing terminal job record"
            );
        }

        let record = JobRecord::processing(resource_key, &self.stage_weights);
        records.insert(resource_key.to_string(), record.clone());
        Ok(record)
    }

    /// Record a stage's progress and recompute the overall percentage
    ///
    /// Returns the new overall progress. Overall progress never decreases.
    pub fn update_progress(
        &self,
        resource_key: &str,
        stage: &str,
        value: u8,
    ) -> Result<u8, RegistryError> {
        let mut records = self.write();
        let record = records
            .get_mut(resource_key)
            .ok_or_else(|| RegistryError::NotFound(resource_key.to_string()))?;

        if record.state != JobState::Processing {
            return Err(RegistryError::InvalidTransition {
                resource_key: resource_key.to_string(),
                state: record.state,
                operation: "update progress",
            });
        }

        let entry = record
            .stages
            .iter_mut()
            .find(|s| s.stage == stage)
            .ok_or_else(|| RegistryError::UnknownStage {
                resource_key: resource_key.to_string(),
                stage: stage.to_string(),
            })?;
        entry.progress = value.min(100);

        let overall = aggregate(&record.weighted_progress());
        record.progress = record.progress.max(overall);
        Ok(record.progress)
    }

    /// PROCESSING → COMPLETED with the persisted document attached
    pub fn complete(
        &self,
        resource_key: &str,
        document: &ResultDocument,
    ) -> Result<JobRecord, RegistryError> {
        let mut records = self.write();
        let record = records
            .get_mut(resource_key)
            .ok_or_else(|| RegistryError::NotFound(resource_key.to_string()))?;

        if record.state != JobState::Processing {
            return Err(RegistryError::InvalidTransition {
                resource_key: resource_key.to_string(),
                state: record.state,
                operation: "complete",
            });
        }

        record.state = JobState::Completed;
        record.progress = 100;
        record.completed_at = Some(Utc::now());
        record.result = Some(ResultRef::from(document));
        record.error = None;
        Ok(record.clone())
    }

    /// PROCESSING → ERROR with `error_detail` attached
    pub fn fail(&self, resource_key: &str, error_detail: &str) -> Result<JobRecord, RegistryError> {
        let mut records = self.write();
        let record = records
            .get_mut(resource_key)
            .ok_or_else(|| RegistryError::NotFound(resource_key.to_string()))?;

        if record.is_terminal() {
            return Err(RegistryError::InvalidTransition {
                resource_key: resource_key.to_string(),
                state: record.state,
                operation: "fail",
            });
        }

        record.state = JobState::Error;
        record.error = Some(error_detail.to_string());
        record.completed_at = Some(Utc::now());
        Ok(record.clone())
    }

    /// Snapshot of the current record
    pub fn get(&self, resource_key: &str) -> Option<JobRecord> {
        self.read().get(resource_key).cloned()
    }

    pub fn is_processing(&self, resource_key: &str) -> bool {
        self.read()
            .get(resource_key)
            .is_some_and(|r| r.state == JobState::Processing)
    }

    /// Snapshots of all records, ordered by resource key
    pub fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.read().values().cloned().collect();
        records.sort_by(|a, b| a.resource_key.cmp(&b.resource_key));
        records
    }
}
