//! Data models for scribe-backend
//!
//! - JobRecord: per-resource lifecycle owned by the JobRegistry
//! - StageJob: one remote stage invocation, transient
//! - ResultDocument: persisted merged transcript

pub mod job_record;
pub mod result_document;
pub mod stage_job;

pub use job_record::{JobRecord, JobState, ResultRef, StageProgress};
pub use result_document::{DocumentStatus, ResultDocument, Segment};
pub use stage_job::{StageJob, StageRole, StageStatus};
