//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between intake and the
//! scheduler.

use chrono::{DateTime, Utc};
use jobsched_core::job_events::{EVENT_JOB_CREATED, EVENT_JOB_UPDATED};
use jobsched_core::{DbId, JobStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// Something happened to a job.
///
/// Built with [`JobEvent::new`] (or the [`created`](JobEvent::created) /
/// [`updated`](JobEvent::updated) shorthands) and enriched with
/// [`with_status`](JobEvent::with_status) and
/// [`with_payload`](JobEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// Dot-separated event name, e.g. `"job.updated"`.
    pub event_type: String,

    pub job_id: DbId,

    /// Job status at the time of the event, if known.
    pub status: Option<JobStatus>,

    /// JSON snapshot of the job, or an empty object.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(event_type: impl Into<String>, job_id: DbId) -> Self {
        Self {
            event_type: event_type.into(),
            job_id,
            status: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// A `job.created` event.
    pub fn created(job_id: DbId) -> Self {
        Self::new(EVENT_JOB_CREATED, job_id).with_status(JobStatus::Pending)
    }

    /// A `job.updated` event carrying the new status.
    pub fn updated(job_id: DbId, status: JobStatus) -> Self {
        Self::new(EVENT_JOB_UPDATED, job_id).with_status(status)
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use jobsched_events::bus::{EventBus, JobEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(JobEvent::created(1));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unconsumed events are dropped and
    /// slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped silently.
    pub fn publish(&self, event: JobEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
