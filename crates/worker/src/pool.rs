//! Bounded worker pool and the per-job execution envelope.
//!
//! [`WorkerPool`] spawns one tokio task per claimed job and caps how many
//! job bodies run at once with a semaphore. [`JobRunner::execute`] wraps
//! each body with execution bookkeeping and the terminal status transition.
//! [`InFlightSet`] tracks the ids occupying worker slots; each id is held by
//! an [`InFlightSlot`] that releases it on drop, so a slot is returned on
//! every exit path including a panicking body.

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use futures::FutureExt;
use jobsched_core::job::elapsed_ms;
use jobsched_core::{DbId, JobStatus};
use jobsched_db::models::execution::{Execution, ExecutionUpdate};
use jobsched_db::models::job::{Job, JobUpdate};
use jobsched_db::{JobStore, StoreError};
use jobsched_events::{EventBus, JobEvent};
use tokio::sync::Semaphore;

use crate::body::JobBody;
use crate::error::{BodyError, WorkerError};

// ---------------------------------------------------------------------------
// In-flight bookkeeping
// ---------------------------------------------------------------------------

/// Ids of jobs currently holding a worker slot.
#[derive(Debug, Clone, Default)]
pub struct InFlightSet {
    ids: Arc<Mutex<BTreeSet<DbId>>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `job_id` as in flight. The id is released when the returned
    /// slot is dropped.
    pub fn acquire(&self, job_id: DbId) -> InFlightSlot {
        self.lock().insert(job_id);
        InFlightSlot {
            set: self.clone(),
            job_id,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, job_id: DbId) -> bool {
        self.lock().contains(&job_id)
    }

    /// Snapshot of the in-flight ids in ascending order.
    pub fn ids(&self) -> Vec<DbId> {
        self.lock().iter().copied().collect()
    }

    // A panic while holding this lock cannot leave the set half-updated.
    fn lock(&self) -> MutexGuard<'_, BTreeSet<DbId>> {
        self.ids.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A held worker slot. Dropping it removes the job id from its set.
#[derive(Debug)]
pub struct InFlightSlot {
    set: InFlightSet,
    job_id: DbId,
}

impl InFlightSlot {
    pub fn job_id(&self) -> DbId {
        self.job_id
    }
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.set.lock().remove(&self.job_id);
    }
}

// ---------------------------------------------------------------------------
// Job execution
// ---------------------------------------------------------------------------

/// Attempts at writing the success outcome of a completed job.
const FINALIZE_ATTEMPTS: usize = 3;

/// Runs claimed jobs and records their outcome.
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    bus: Arc<EventBus>,
    body: Arc<dyn JobBody>,
}

impl JobRunner {
    pub fn new(store: Arc<dyn JobStore>, bus: Arc<EventBus>, body: Arc<dyn JobBody>) -> Self {
        Self { store, bus, body }
    }

    /// Execute one claimed (Running) job.
    ///
    /// Opens an execution record, runs the body, then moves the job to
    /// Completed or Failed and finalizes the execution. Never returns an
    /// error: failures while recording a failure are logged and dropped.
    pub async fn execute(&self, job: Job) {
        let job_id = job.id;

        let execution = match self.store.create_execution(job_id).await {
            Ok(execution) => execution,
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to open execution record");
                self.mark_failed(job_id, None, &format!("Failed to open execution record: {e}"))
                    .await;
                return;
            }
        };

        tracing::info!(
            job_id,
            execution_id = execution.id,
            name = %job.name,
            "Job started",
        );

        let outcome = AssertUnwindSafe(self.body.run(&job))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(BodyError::Panicked(panic_message(payload.as_ref()))));

        let error = match outcome {
            Ok(()) => match self.complete(&execution).await {
                Ok(()) => return,
                Err(e) => e.to_string(),
            },
            Err(e) => e.to_string(),
        };
        self.mark_failed(job_id, Some(&execution), &error).await;
    }

    /// Completion path: re-read the job and complete it only if it is
    /// still Running.
    async fn complete(&self, execution: &Execution) -> Result<(), StoreError> {
        let job_id = execution.job_id;

        let current = self.store.get_job(job_id).await?;
        if current.status != JobStatus::Running {
            return self.abort_execution(execution, current.status).await;
        }

        let Some(done) = self
            .store
            .update_job(job_id, &JobUpdate::complete(Utc::now()))
            .await?
        else {
            // Changed between the read and the guarded update.
            let latest = self.store.get_job(job_id).await?;
            return self.abort_execution(execution, latest.status).await;
        };

        // The job is Completed from here on, so the failure path must not
        // touch its execution.
        self.finalize_success(execution, &done).await;
        self.publish_update(&done);
        Ok(())
    }

    /// Write `success = true` for a job already committed as Completed,
    /// retrying a failed write a bounded number of times.
    async fn finalize_success(&self, execution: &Execution, done: &Job) {
        let completed_at = done.completed_at.unwrap_or_else(Utc::now);
        let execution_time_ms = elapsed_ms(execution.started_at, completed_at);
        let update = ExecutionUpdate {
            completed_at,
            execution_time_ms,
            success: true,
            error_message: None,
        };

        for attempt in 1..=FINALIZE_ATTEMPTS {
            match self.store.update_execution(execution.id, &update).await {
                Ok(_) => {
                    tracing::info!(
                        job_id = done.id,
                        execution_id = execution.id,
                        execution_time_ms,
                        "Job completed",
                    );
                    return;
                }
                Err(e) if attempt < FINALIZE_ATTEMPTS => {
                    tracing::warn!(
                        job_id = done.id,
                        execution_id = execution.id,
                        attempt,
                        error = %e,
                        "Retrying execution finalize",
                    );
                }
                Err(e) => {
                    tracing::error!(
                        job_id = done.id,
                        execution_id = execution.id,
                        error = %e,
                        "Job completed but its execution could not be finalized",
                    );
                }
            }
        }
    }

    /// The job left Running while its body ran. Leave the job alone and
    /// close the execution as unsuccessful.
    async fn abort_execution(
        &self,
        execution: &Execution,
        status: JobStatus,
    ) -> Result<(), StoreError> {
        tracing::warn!(
            job_id = execution.job_id,
            execution_id = execution.id,
            %status,
            "Job status changed externally while running, leaving it untouched",
        );
        let now = Utc::now();
        self.store
            .update_execution(
                execution.id,
                &ExecutionUpdate {
                    completed_at: now,
                    execution_time_ms: elapsed_ms(execution.started_at, now),
                    success: false,
                    error_message: Some(format!("job status changed externally to {status}")),
                },
            )
            .await?;
        Ok(())
    }

    /// Failure path. Every store error here is logged and swallowed.
    async fn mark_failed(&self, job_id: DbId, execution: Option<&Execution>, error: &str) {
        let now = Utc::now();

        match self.store.update_job(job_id, &JobUpdate::fail(now)).await {
            Ok(Some(job)) => {
                tracing::error!(job_id, error, "Job failed");
                self.publish_update(&job);
            }
            Ok(None) => {
                tracing::warn!(job_id, error, "Job failed but is no longer running");
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Error handling job failure");
            }
        }

        let Some(execution) = execution else {
            return;
        };
        let update = ExecutionUpdate {
            completed_at: now,
            execution_time_ms: elapsed_ms(execution.started_at, now),
            success: false,
            error_message: Some(error.to_string()),
        };
        if let Err(e) = self.store.update_execution(execution.id, &update).await {
            tracing::error!(
                job_id,
                execution_id = execution.id,
                error = %e,
                "Error finalizing failed execution",
            );
        }
    }

    /// Publish a `job.updated` event with a snapshot of `job`.
    pub fn publish_update(&self, job: &Job) {
        let payload = serde_json::to_value(job).unwrap_or_default();
        self.bus
            .publish(JobEvent::updated(job.id, job.status).with_payload(payload));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ---------------------------------------------------------------------------
// WorkerPool
// ---------------------------------------------------------------------------

/// A job the pool refused, returned with the slot it was holding.
#[derive(Debug)]
pub struct Rejected {
    pub reason: WorkerError,
    pub job: Job,
    pub slot: InFlightSlot,
}

/// Fixed-capacity pool of job tasks.
///
/// Shutting the pool down only stops new submissions; tasks already
/// spawned run to completion.
pub struct WorkerPool {
    capacity: usize,
    semaphore: Arc<Semaphore>,
    accepting: AtomicBool,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            accepting: AtomicBool::new(true),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of job bodies currently holding a permit.
    pub fn active(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Spawn `job` on the pool. `slot` is held until the task ends.
    ///
    /// After [`shutdown`](Self::shutdown) the job and its slot are handed
    /// back in a [`Rejected`] with [`WorkerError::PoolShutDown`].
    pub fn submit(
        &self,
        runner: Arc<JobRunner>,
        job: Job,
        slot: InFlightSlot,
    ) -> Result<(), Rejected> {
        if !self.is_accepting() {
            return Err(Rejected {
                reason: WorkerError::PoolShutDown,
                job,
                slot,
            });
        }

        let semaphore = Arc::clone(&self.semaphore);
        tokio::spawn(async move {
            let _slot = slot;
            // The semaphore is never closed.
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            runner.execute(job).await;
        });
        Ok(())
    }

    /// Stop accepting new jobs without waiting for running ones.
    pub fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    /// Accept jobs again after a shutdown.
    pub fn reopen(&self) {
        self.accepting.store(true, Ordering::SeqCst);
    }
}
