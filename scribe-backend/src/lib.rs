//! scribe-backend library interface
//!
//! Exposes the orchestration core and the HTTP router for integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use axum::Router;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use scribe_common::events::EventBus;
use scribe_common::{Error, Result};

use crate::config::ServiceConfig;
use crate::services::{
    job_queue, AudioLibrary, FfprobeProbe, FileResultStore, HttpServiceClient, JobRegistry,
    MediaProbe, Orchestrator, ResultStore, Stage, WorkerPool,
};

/// Capacity of the SSE broadcast channel
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub registry: Arc<JobRegistry>,
    pub store: Arc<dyn ResultStore>,
    pub library: Arc<AudioLibrary>,
    pub probe: Arc<dyn MediaProbe>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Allowed CORS origin; any origin when unset
    pub cors_origin: Option<String>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn ResultStore>,
        library: Arc<AudioLibrary>,
        probe: Arc<dyn MediaProbe>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            registry: Arc::clone(orchestrator.registry()),
            orchestrator,
            store,
            library,
            probe,
            event_bus,
            cors_origin: None,
            startup_time: Utc::now(),
        }
    }

    pub fn with_cors_origin(mut self, origin: Option<String>) -> Self {
        self.cors_origin = origin;
        self
    }
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    match origin.and_then(|o| HeaderValue::from_str(o).ok()) {
        Some(origin) => layer.allow_origin(origin),
        None => layer.allow_origin(Any),
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.cors_origin.as_deref());

    Router::new()
        .merge(api::health_routes())
        .merge(api::job_routes())
        .merge(api::transcript_routes())
        .merge(api::audio_routes())
        .merge(api::event_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Running service: shared state plus the worker pool behind it
pub struct Service {
    pub state: AppState,
    pub workers: WorkerPool,
}

/// Wire every component from resolved configuration and start the workers
///
/// Must be called inside a tokio runtime.
pub fn start_service(config: &ServiceConfig, shutdown: CancellationToken) -> Result<Service> {
    let registry = Arc::new(JobRegistry::new(config.stage_weights()));
    let store: Arc<dyn ResultStore> = Arc::new(FileResultStore::new(&config.transcript_dir));
    let probe: Arc<dyn MediaProbe> = Arc::new(FfprobeProbe::new(config.ffprobe_path.clone()));
    let library = Arc::new(AudioLibrary::new(&config.audio_dir));
    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);

    let stages = config
        .stages
        .iter()
        .map(|stage| {
            let client = HttpServiceClient::new(&stage.name, &stage.url, &stage.submit_path)
                .map_err(|e| Error::Config(e.to_string()))?;
            Ok(Stage::new(&stage.name, stage.weight, stage.role, Arc::new(client)))
        })
        .collect::<Result<Vec<_>>>()?;

    let (queue, receiver) = job_queue(config.queue_capacity);
    let orchestrator = Arc::new(
        Orchestrator::new(Arc::clone(&registry), Arc::clone(&store), stages, event_bus.clone())
            .with_probe(Arc::clone(&probe))
            .with_poll_policy(config.poll_policy.clone())
            .with_execution(config.execution)
            .with_audio_dir(&config.audio_dir)
            .with_queue(queue),
    );

    let workers = WorkerPool::start(
        Arc::clone(&orchestrator),
        receiver,
        config.workers,
        shutdown,
    );

    let state = AppState::new(orchestrator, store, library, probe, event_bus)
        .with_cors_origin(config.cors_origin.clone());

    Ok(Service { state, workers })
}
