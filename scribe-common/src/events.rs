//! Event types for the Scribe event system
//!
//! Provides the job lifecycle events and the EventBus that fans them out to
//! SSE subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Scribe event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScribeEvent {
    /// A job was accepted and its pipeline started
    JobStarted {
        resource_key: String,
        timestamp: DateTime<Utc>,
    },

    /// A stage reported new progress
    JobProgress {
        resource_key: String,
        /// Stage that reported
        stage: String,
        /// Progress of that stage (0-100)
        stage_progress: u8,
        /// Weighted overall progress (0-100)
        progress: u8,
        timestamp: DateTime<Utc>,
    },

    /// Result document persisted, job completed
    JobCompleted {
        resource_key: String,
        processing_time_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// Job ended in ERROR
    JobFailed {
        resource_key: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ScribeEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            ScribeEvent::JobStarted { .. } => "JobStarted",
            ScribeEvent::JobProgress { .. } => "JobProgress",
            ScribeEvent::JobCompleted { .. } => "JobCompleted",
            ScribeEvent::JobFailed { .. } => "JobFailed",
        }
    }

    /// Resource key the event refers to
    pub fn resource_key(&self) -> &str {
        match self {
            ScribeEvent::JobStarted { resource_key, .. }
            | ScribeEvent::JobProgress { resource_key, .. }
            | ScribeEvent::JobCompleted { resource_key, .. }
            | ScribeEvent::JobFailed { resource_key, .. } => resource_key,
        }
    }
}

/// Broadcast bus for ScribeEvent
///
/// Cloning is cheap; all clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScribeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    ///
    /// # Examples
    ///
    /// ```
    /// use scribe_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ScribeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ScribeEvent,
    ) -> Result<usize, broadcast::error::SendError<ScribeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ScribeEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
