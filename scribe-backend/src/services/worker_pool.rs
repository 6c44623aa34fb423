//! Bounded worker pool for admitted jobs
//!
//! Admitted resource keys go through a bounded queue; a fixed number of
//! workers take keys off it and run the pipeline, so distinct keys proceed in
//! parallel up to the worker count.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::services::orchestrator::Orchestrator;

/// Sending half of the job queue
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<String>,
}

impl JobQueue {
    /// Enqueue a key, waiting for capacity
    pub async fn send(&self, resource_key: String) -> Result<(), mpsc::error::SendError<String>> {
        self.tx.send(resource_key).await
    }
}

/// Receiving half of the job queue, shared by all workers
pub type JobReceiver = Arc<Mutex<mpsc::Receiver<String>>>;

/// Create a job queue holding at most `capacity` waiting keys
pub fn job_queue(capacity: usize) -> (JobQueue, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (JobQueue { tx }, Arc::new(Mutex::new(rx)))
}

/// Fixed set of tokio tasks running queued jobs
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl WorkerPool {
    /// Spawn `worker_count` workers (at least one) on `receiver`
    pub fn start(
        orchestrator: Arc<Orchestrator>,
        receiver: JobReceiver,
        worker_count: usize,
        shutdown: CancellationToken,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let workers = (0..worker_count)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    Arc::clone(&orchestrator),
                    Arc::clone(&receiver),
                    shutdown.clone(),
                ))
            })
            .collect();

        tracing::info!(worker_count, "Started workers");

        Self { workers, shutdown }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop taking new keys and wait for running jobs to finish
    pub async fn shutdown(self) {
        tracing::info!("Shutting down worker pool...");
        self.shutdown.cancel();

        for (worker_id, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                tracing::error!(worker_id, error = %e, "Worker panicked");
            }
        }

        tracing::info!("All workers have stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    orchestrator: Arc<Orchestrator>,
    receiver: JobReceiver,
    shutdown: CancellationToken,
) {
    tracing::debug!(worker_id, "Worker started");

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => None,
            key = async { receiver.lock().await.recv().await } => key,
        };

        let Some(resource_key) = next else {
            break;
        };

        tracing::debug!(worker_id, resource_key = %resource_key, "Worker picked up job");
        // Outcome is recorded in the registry and logged by the orchestrator
        let _ = orchestrator.run_accepted(&resource_key).await;
    }

    tracing::debug!(worker_id, "Worker stopped");
}
