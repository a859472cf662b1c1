//! Entry point for collaborators that enqueue jobs.

use chrono::Utc;
use jobsched_core::job::validate_new_job;
use jobsched_db::models::job::{Job, NewJob};
use jobsched_db::JobStore;
use jobsched_events::{EventBus, JobEvent};

use crate::error::WorkerError;

/// Validate `input`, store it as a Pending job and publish `job.created`.
///
/// Invalid input is rejected before anything is written.
pub async fn submit_job(
    store: &dyn JobStore,
    bus: &EventBus,
    input: &NewJob,
) -> Result<Job, WorkerError> {
    validate_new_job(
        &input.name,
        input.estimated_duration_ms,
        input.deadline,
        Utc::now(),
    )?;

    let job = store.create_job(input).await?;
    tracing::info!(
        job_id = job.id,
        name = %job.name,
        priority = %job.priority,
        deadline = %job.deadline,
        "Job submitted",
    );

    let payload = serde_json::to_value(&job).unwrap_or_default();
    bus.publish(JobEvent::created(job.id).with_payload(payload));
    Ok(job)
}
