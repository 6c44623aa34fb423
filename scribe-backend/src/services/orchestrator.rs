//! Transcription pipeline orchestrator
//!
//! Drives one job end to end: gate through the registry, health-check every
//! backend, submit and poll each stage, merge, probe duration, persist, then
//! finalize the record. Any failure after the gate ends the record in ERROR
//! with the triggering error's message, and nothing is persisted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinSet;

use scribe_common::events::{EventBus, ScribeEvent};
use scribe_common::time::now;

use crate::models::{JobRecord, ResultDocument, StageJob, StageRole};
use crate::services::job_registry::{JobRegistry, RegistryError};
use crate::services::media_probe::MediaProbe;
use crate::services::merge::{merge_stage_results, MergeError};
use crate::services::poll_policy::PollPolicy;
use crate::services::result_store::{ResultStore, StoreError};
use crate::services::service_client::{ServiceClient, ServiceError, ServiceHealth};
use crate::services::worker_pool::JobQueue;

/// Pipeline errors
///
/// The `Display` text of whichever variant ends a job becomes the record's
/// error detail verbatim.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Already processing {0}")]
    AlreadyProcessing(String),

    #[error("Model services not available: {summary}")]
    ServiceUnavailable {
        summary: String,
        services: Vec<ServiceHealth>,
    },

    #[error(transparent)]
    Stage(#[from] ServiceError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("Failed to save transcript: {0}")]
    Persistence(#[from] StoreError),

    #[error(transparent)]
    Registry(RegistryError),

    #[error("Stage task failed: {0}")]
    Join(String),

    #[error("Job queue is closed")]
    QueueClosed,
}

impl From<RegistryError> for PipelineError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Conflict(key) => PipelineError::AlreadyProcessing(key),
            other => PipelineError::Registry(other),
        }
    }
}

/// Whether stages run one after another or all at once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageExecution {
    #[default]
    Sequential,
    Concurrent,
}

/// One configured pipeline stage
#[derive(Clone)]
pub struct Stage {
    pub name: String,
    pub weight: f64,
    pub role: StageRole,
    pub client: Arc<dyn ServiceClient>,
}

impl Stage {
    pub fn new(
        name: impl Into<String>,
        weight: f64,
        role: StageRole,
        client: Arc<dyn ServiceClient>,
    ) -> Self {
        Self {
            name: name.into(),
            weight,
            role,
            client,
        }
    }
}

/// Health of every configured backend
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub all_healthy: bool,
    pub services: Vec<ServiceHealth>,
}

impl HealthReport {
    fn into_unavailable(self) -> PipelineError {
        let summary = self
            .services
            .iter()
            .filter(|s| !s.healthy)
            .map(|s| match s.detail.get("error").and_then(|e| e.as_str()) {
                Some(error) => format!("{} ({})", s.service, error),
                None => s.service.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        PipelineError::ServiceUnavailable {
            summary,
            services: self.services,
        }
    }
}

/// Everything a stage task needs, cloneable into spawned tasks
#[derive(Clone)]
struct StageContext {
    registry: Arc<JobRegistry>,
    event_bus: EventBus,
    policy: PollPolicy,
}

impl StageContext {
    fn record_progress(&self, resource_key: &str, stage: &str, value: u8) {
        match self.registry.update_progress(resource_key, stage, value) {
            Ok(progress) => {
                tracing::debug!(resource_key, stage, stage_progress = value, progress, "Progress");
                self.event_bus.emit_lossy(ScribeEvent::JobProgress {
                    resource_key: resource_key.to_string(),
                    stage: stage.to_string(),
                    stage_progress: value,
                    progress,
                    timestamp: now(),
                });
            }
            Err(e) => {
                tracing::warn!(resource_key, stage, error = %e, "Progress update rejected");
            }
        }
    }

    async fn run_stage(self, resource_key: String, stage: Stage) -> Result<StageJob, ServiceError> {
        let stage_job_id = stage.client.submit(&resource_key).await?;
        let mut job = StageJob::queued(stage_job_id, stage.name.clone(), stage.role);

        tracing::info!(
            resource_key = %resource_key,
            stage = %stage.name,
            stage_job_id = %job.stage_job_id,
            "Waiting for stage"
        );

        let on_progress = |value: u8| self.record_progress(&resource_key, &stage.name, value);
        match stage
            .client
            .wait_for_completion(&job.stage_job_id, &self.policy, &on_progress)
            .await
        {
            Ok(result) => {
                self.record_progress(&resource_key, &stage.name, 100);
                job.complete(result);
                Ok(job)
            }
            Err(e) => {
                job.fail(e.to_string());
                Err(e)
            }
        }
    }
}

/// Drives transcription jobs
pub struct Orchestrator {
    registry: Arc<JobRegistry>,
    store: Arc<dyn ResultStore>,
    stages: Vec<Stage>,
    event_bus: EventBus,
    probe: Option<Arc<dyn MediaProbe>>,
    policy: PollPolicy,
    execution: StageExecution,
    audio_dir: PathBuf,
    queue: Option<JobQueue>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<JobRegistry>,
        store: Arc<dyn ResultStore>,
        stages: Vec<Stage>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            registry,
            store,
            stages,
            event_bus,
            probe: None,
            policy: PollPolicy::default(),
            execution: StageExecution::default(),
            audio_dir: PathBuf::new(),
            queue: None,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_execution(mut self, execution: StageExecution) -> Self {
        self.execution = execution;
        self
    }

    /// Directory the resource keys are resolved against for probing
    pub fn with_audio_dir(mut self, audio_dir: impl Into<PathBuf>) -> Self {
        self.audio_dir = audio_dir.into();
        self
    }

    /// Queue that `accept` hands admitted keys to
    pub fn with_queue(mut self, queue: JobQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Health-check every backend concurrently
    pub async fn check_health(&self) -> HealthReport {
        let services = join_all(self.stages.iter().map(|s| s.client.health_check())).await;
        HealthReport {
            all_healthy: services.iter().all(|s| s.healthy),
            services,
        }
    }

    /// Run the whole pipeline for `resource_key` on the calling task
    pub async fn process(&self, resource_key: &str) -> Result<ResultDocument, PipelineError> {
        self.begin(resource_key)?;
        self.run_accepted(resource_key).await
    }

    /// Admit `resource_key` and queue it for a worker
    ///
    /// Unlike [`process`](Self::process), an unhealthy backend is reported
    /// before any record exists, so a rejected request leaves no trace.
    pub async fn accept(&self, resource_key: &str) -> Result<JobRecord, PipelineError> {
        if self.registry.is_processing(resource_key) {
            return Err(PipelineError::AlreadyProcessing(resource_key.to_string()));
        }

        let health = self.check_health().await;
        if !health.all_healthy {
            let err = health.into_unavailable();
            tracing::warn!(resource_key, error = %err, "Rejecting job");
            return Err(err);
        }

        let queue = self.queue.as_ref().ok_or(PipelineError::QueueClosed)?;
        let record = self.begin(resource_key)?;

        if queue.send(resource_key.to_string()).await.is_err() {
            self.finish_failed(resource_key, &PipelineError::QueueClosed);
            return Err(PipelineError::QueueClosed);
        }

        Ok(record)
    }

    /// Run steps after admission for a key already PROCESSING
    pub async fn run_accepted(&self, resource_key: &str) -> Result<ResultDocument, PipelineError> {
        match self.run_pipeline(resource_key).await {
            Ok(document) => {
                tracing::info!(
                    resource_key,
                    segments = document.segments.len(),
                    speakers = document.speakers().len(),
                    language = %document.language,
                    processing_time_seconds = document.processing_time_seconds,
                    "Job completed"
                );
                self.event_bus.emit_lossy(ScribeEvent::JobCompleted {
                    resource_key: resource_key.to_string(),
                    processing_time_seconds: document.processing_time_seconds,
                    timestamp: now(),
                });
                Ok(document)
            }
            Err(e) => {
                self.finish_failed(resource_key, &e);
                Err(e)
            }
        }
    }

    fn begin(&self, resource_key: &str) -> Result<JobRecord, PipelineError> {
        let record = self.registry.try_begin(resource_key)?;
        tracing::info!(resource_key, stages = self.stages.len(), "Job started");
        self.event_bus.emit_lossy(ScribeEvent::JobStarted {
            resource_key: resource_key.to_string(),
            timestamp: now(),
        });
        Ok(record)
    }

    fn finish_failed(&self, resource_key: &str, error: &PipelineError) {
        let detail = error.to_string();
        tracing::error!(resource_key, error = %detail, "Job failed");
        if let Err(e) = self.registry.fail(resource_key, &detail) {
            tracing::warn!(resource_key, error = %e, "Could not mark job failed");
        }
        self.event_bus.emit_lossy(ScribeEvent::JobFailed {
            resource_key: resource_key.to_string(),
            error: detail,
            timestamp: now(),
        });
    }

    async fn run_pipeline(&self, resource_key: &str) -> Result<ResultDocument, PipelineError> {
        let started = Instant::now();

        let health = self.check_health().await;
        if !health.all_healthy {
            return Err(health.into_unavailable());
        }

        let jobs = match self.execution {
            StageExecution::Sequential => self.run_sequential(resource_key).await?,
            StageExecution::Concurrent => self.run_concurrent(resource_key).await?,
        };

        let merged = merge_stage_results(&jobs)?;
        let mut document =
            ResultDocument::new(resource_key, merged.text, merged.segments, merged.language);

        if let Some(probe) = &self.probe {
            document.duration_seconds = probe
                .duration_seconds(&self.audio_dir.join(resource_key))
                .await;
        }
        document.processing_time_seconds = started.elapsed().as_secs_f64();

        let saved = self.store.save(resource_key, document).await?;
        self.registry.complete(resource_key, &saved)?;
        Ok(saved)
    }

    fn context(&self) -> StageContext {
        StageContext {
            registry: Arc::clone(&self.registry),
            event_bus: self.event_bus.clone(),
            policy: self.policy.clone(),
        }
    }

    async fn run_sequential(&self, resource_key: &str) -> Result<Vec<StageJob>, PipelineError> {
        let mut jobs = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let job = self
                .context()
                .run_stage(resource_key.to_string(), stage.clone())
                .await?;
            jobs.push(job);
        }
        Ok(jobs)
    }

    async fn run_concurrent(&self, resource_key: &str) -> Result<Vec<StageJob>, PipelineError> {
        let mut tasks = JoinSet::new();
        for (index, stage) in self.stages.iter().enumerate() {
            let run = self.context().run_stage(resource_key.to_string(), stage.clone());
            tasks.spawn(async move { (index, run.await) });
        }

        let mut slots: Vec<Option<StageJob>> = vec![None; self.stages.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(job))) => slots[index] = Some(job),
                Ok((_, Err(e))) => {
                    tasks.abort_all();
                    return Err(e.into());
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(PipelineError::Join(e.to_string()));
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}
