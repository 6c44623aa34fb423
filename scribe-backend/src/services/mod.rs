//! Services for scribe-backend

pub mod audio_library;
pub mod job_registry;
pub mod media_probe;
pub mod merge;
pub mod orchestrator;
pub mod poll_policy;
pub mod progress;
pub mod result_store;
pub mod service_client;
pub mod worker_pool;

pub use audio_library::{AudioFile, AudioLibrary, LibraryError};
pub use job_registry::{JobRegistry, RegistryError};
pub use media_probe::{FfprobeProbe, MediaProbe};
pub use merge::{merge_stage_results, MergeError, MergedTranscript, SpeakerTurn};
pub use orchestrator::{HealthReport, Orchestrator, PipelineError, Stage, StageExecution};
pub use poll_policy::PollPolicy;
pub use progress::aggregate;
pub use result_store::{FileResultStore, ResultStore, StoreError};
pub use service_client::{HttpServiceClient, ServiceClient, ServiceError, ServiceHealth, StatusReport};
pub use worker_pool::{job_queue, JobQueue, JobReceiver, WorkerPool};
