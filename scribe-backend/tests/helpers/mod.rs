//! Shared fixtures for scribe-backend integration tests
//!
//! Model backends are replaced by scripted in-process clients.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use scribe_backend::models::{ResultDocument, StageRole, StageStatus};
use scribe_backend::services::{
    job_queue, AudioLibrary, FileResultStore, JobReceiver, JobRegistry, MediaProbe, Orchestrator,
    PollPolicy, ResultStore, ServiceClient, ServiceError, ServiceHealth, Stage, StageExecution,
    StatusReport, StoreError,
};
use scribe_backend::AppState;
use scribe_common::events::EventBus;

/// Backend double replaying a fixed list of poll outcomes
///
/// Once the script runs out every poll reports PROCESSING, i.e. a stalled job.
pub struct ScriptedClient {
    name: String,
    healthy: AtomicBool,
    polls: Mutex<VecDeque<Result<StatusReport, ServiceError>>>,
    submissions: AtomicUsize,
    submit_error: Mutex<Option<String>>,
}

impl ScriptedClient {
    pub fn new(name: &str, polls: Vec<StatusReport>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            healthy: AtomicBool::new(true),
            polls: Mutex::new(polls.into_iter().map(Ok).collect()),
            submissions: AtomicUsize::new(0),
            submit_error: Mutex::new(None),
        })
    }

    /// Healthy client whose every submit is rejected with `message`
    pub fn rejecting(name: &str, message: &str) -> Arc<Self> {
        let client = Self::new(name, Vec::new());
        *client.submit_error.lock().unwrap() = Some(message.to_string());
        client
    }

    pub fn unhealthy(name: &str) -> Arc<Self> {
        let client = Self::new(name, Vec::new());
        client.set_healthy(false);
        client
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Append more outcomes to the script
    pub fn push(&self, report: StatusReport) {
        self.polls.lock().unwrap().push_back(Ok(report));
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceClient for ScriptedClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> ServiceHealth {
        if self.healthy.load(Ordering::SeqCst) {
            ServiceHealth {
                service: self.name.clone(),
                healthy: true,
                detail: json!({"status": "healthy"}),
            }
        } else {
            ServiceHealth::unhealthy(&self.name, "connection refused")
        }
    }

    async fn submit(&self, _resource_ref: &str) -> Result<String, ServiceError> {
        if let Some(message) = self.submit_error.lock().unwrap().clone() {
            return Err(ServiceError::Submission {
                service: self.name.clone(),
                message,
            });
        }
        let n = self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}-job-{}", self.name, n + 1))
    }

    async fn poll_status(&self, _stage_job_id: &str) -> Result<StatusReport, ServiceError> {
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(processing(None)))
    }
}

/// Probe reporting a fixed duration
pub struct FixedProbe(pub Option<f64>);

#[async_trait]
impl MediaProbe for FixedProbe {
    async fn duration_seconds(&self, _path: &Path) -> Option<f64> {
        self.0
    }
}

/// Store whose writes always fail; reads go to the wrapped store
pub struct ReadOnlyStore(pub Arc<FileResultStore>);

#[async_trait]
impl ResultStore for ReadOnlyStore {
    async fn save(
        &self,
        resource_key: &str,
        _document: ResultDocument,
    ) -> Result<ResultDocument, StoreError> {
        Err(StoreError::Io {
            path: self.0.path_for(resource_key)?,
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only file system"),
        })
    }

    async fn load(&self, resource_key: &str) -> Result<Option<ResultDocument>, StoreError> {
        self.0.load(resource_key).await
    }
}

pub fn processing(progress: Option<u8>) -> StatusReport {
    StatusReport {
        status: StageStatus::Processing,
        progress,
        result: None,
        error: None,
    }
}

pub fn completed(result: Value) -> StatusReport {
    StatusReport {
        status: StageStatus::Completed,
        progress: Some(100),
        result: Some(result),
        error: None,
    }
}

pub fn failed(message: &str) -> StatusReport {
    StatusReport {
        status: StageStatus::Error,
        progress: None,
        result: None,
        error: Some(message.to_string()),
    }
}

/// Primary stage output for a one-segment English transcript
pub fn lecture_transcript() -> Value {
    json!({
        "text": "hi",
        "segments": [{"start": 0.0, "end": 5.0, "text": "hi"}],
        "language": "en"
    })
}

pub fn speaker_turns() -> Value {
    json!({
        "segments": [{"start": 0.0, "end": 5.0, "speaker": "SPEAKER_00"}]
    })
}

pub fn stage(name: &str, weight: f64, role: StageRole, client: Arc<ScriptedClient>) -> Stage {
    Stage::new(name, weight, role, client)
}

pub fn fast_policy() -> PollPolicy {
    PollPolicy::fixed(Duration::from_millis(10))
}

/// Orchestrator wired to temp directories and a live job queue
pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub registry: Arc<JobRegistry>,
    pub store: Arc<FileResultStore>,
    pub event_bus: EventBus,
    pub receiver: JobReceiver,
    pub audio_dir: TempDir,
    pub transcript_dir: TempDir,
}

pub struct HarnessOptions {
    pub policy: PollPolicy,
    pub execution: StageExecution,
    pub duration: Option<f64>,
    /// Orchestrator writes through a [`ReadOnlyStore`]
    pub read_only_store: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            policy: fast_policy(),
            execution: StageExecution::Sequential,
            duration: Some(184.0),
            read_only_store: false,
        }
    }
}

pub fn harness(stages: Vec<Stage>) -> Harness {
    harness_with(stages, HarnessOptions::default())
}

pub fn harness_with(stages: Vec<Stage>, options: HarnessOptions) -> Harness {
    let audio_dir = TempDir::new().unwrap();
    let transcript_dir = TempDir::new().unwrap();
    std::fs::write(audio_dir.path().join("lecture.mp3"), b"ID3 fake mp3 bytes").unwrap();

    let weights = stages.iter().map(|s| (s.name.clone(), s.weight)).collect();
    let registry = Arc::new(JobRegistry::new(weights));
    let store = Arc::new(FileResultStore::new(transcript_dir.path()));
    let event_bus = EventBus::new(100);
    let (queue, receiver) = job_queue(8);

    let pipeline_store: Arc<dyn ResultStore> = if options.read_only_store {
        Arc::new(ReadOnlyStore(Arc::clone(&store)))
    } else {
        Arc::clone(&store) as Arc<dyn ResultStore>
    };

    let orchestrator = Arc::new(
        Orchestrator::new(
            Arc::clone(&registry),
            pipeline_store,
            stages,
            event_bus.clone(),
        )
        .with_probe(Arc::new(FixedProbe(options.duration)))
        .with_poll_policy(options.policy)
        .with_execution(options.execution)
        .with_audio_dir(audio_dir.path())
        .with_queue(queue),
    );

    Harness {
        orchestrator,
        registry,
        store,
        event_bus,
        receiver,
        audio_dir,
        transcript_dir,
    }
}

impl Harness {
    pub fn app_state(&self) -> AppState {
        AppState::new(
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.store) as Arc<dyn ResultStore>,
            Arc::new(AudioLibrary::new(self.audio_dir.path())),
            Arc::new(FixedProbe(Some(184.0))),
            self.event_bus.clone(),
        )
    }
}
