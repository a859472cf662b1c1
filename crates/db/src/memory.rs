//! In-process [`JobStore`] for tests and embedded use.
//!
//! All state sits behind one async mutex. A claim reads the Pending set,
//! orders it with [`select_for_claim`] and flips the chosen rows to Running
//! while holding that lock, so concurrent claimers can never overlap.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use jobsched_core::scheduling::state_machine;
use jobsched_core::selection::{select_for_claim, ClaimKey};
use jobsched_core::{DbId, JobStatus};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::models::execution::{Execution, ExecutionUpdate};
use crate::models::job::{Job, JobListQuery, JobUpdate, NewJob};
use crate::store::JobStore;

#[derive(Debug, Default)]
struct MemoryState {
    jobs: BTreeMap<DbId, Job>,
    executions: BTreeMap<DbId, Execution>,
    next_job_id: DbId,
    next_execution_id: DbId,
}

impl MemoryState {
    fn job_mut(&mut self, id: DbId) -> Result<&mut Job, StoreError> {
        self.jobs
            .get_mut(&id)
            .ok_or_else(|| StoreError::job_not_found(id))
    }
}

/// In-memory job store with the same claim semantics as the Postgres one.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    state: Mutex<MemoryState>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs with `status`.
    pub async fn count_by_status(&self, status: JobStatus) -> usize {
        self.state
            .lock()
            .await
            .jobs
            .values()
            .filter(|job| job.status == status)
            .count()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, input: &NewJob) -> Result<Job, StoreError> {
        if input.estimated_duration_ms < 0 {
            return Err(StoreError::Validation(
                "Estimated duration must not be negative".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        state.next_job_id += 1;
        let now = Utc::now();
        let job = Job {
            id: state.next_job_id,
            name: input.name.clone(),
            estimated_duration_ms: input.estimated_duration_ms,
            priority: input.priority,
            deadline: input.deadline,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        };
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: DbId) -> Result<Job, StoreError> {
        self.state
            .lock()
            .await
            .jobs
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::job_not_found(id))
    }

    async fn list_jobs(&self, query: &JobListQuery) -> Result<Vec<Job>, StoreError> {
        let (limit, offset) = query.page();
        let state = self.state.lock().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|job| query.status.is_none_or(|status| job.status == status))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(jobs
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn select_and_claim(&self, limit: usize) -> Result<Vec<Job>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut state = self.state.lock().await;
        let candidates: Vec<ClaimKey> = state
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Pending)
            .map(Job::claim_key)
            .collect();

        let now = Utc::now();
        let mut claimed = Vec::new();
        for id in select_for_claim(&candidates, limit) {
            let job = state.job_mut(id)?;
            job.status = JobStatus::Running;
            job.started_at = Some(now);
            job.updated_at = now;
            claimed.push(job.clone());
        }
        Ok(claimed)
    }

    async fn update_job(&self, id: DbId, update: &JobUpdate) -> Result<Option<Job>, StoreError> {
        let mut state = self.state.lock().await;
        let job = state.job_mut(id)?;

        if let Some(expected) = update.only_if_status.filter(|expected| *expected != job.status) {
            tracing::debug!(job_id = id, current = %job.status, %expected, "Guarded job update skipped");
            return Ok(None);
        }

        let now = Utc::now();
        if let Some(target) = update.status.filter(|target| *target != job.status) {
            state_machine::validate_transition(job.status, target)?;
            job.status = target;
            if target == JobStatus::Running {
                job.started_at = Some(update.started_at.unwrap_or(now));
            }
            if target.is_terminal() {
                job.completed_at = Some(update.completed_at.unwrap_or(now));
            }
        }
        if let Some(started_at) = update.started_at {
            job.started_at = Some(started_at);
        }
        if let Some(completed_at) = update.completed_at {
            job.completed_at = Some(completed_at);
        }
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn delete_job(&self, id: DbId) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        match state.jobs.get(&id) {
            None => return Ok(false),
            Some(job) if job.status == JobStatus::Running => {
                return Err(StoreError::Conflict(format!(
                    "Job {id} is running and cannot be deleted"
                )));
            }
            Some(_) => {}
        }
        state.jobs.remove(&id);
        state.executions.retain(|_, execution| execution.job_id != id);
        Ok(true)
    }

    async fn create_execution(&self, job_id: DbId) -> Result<Execution, StoreError> {
        let mut state = self.state.lock().await;
        if !state.jobs.contains_key(&job_id) {
            return Err(StoreError::job_not_found(job_id));
        }
        state.next_execution_id += 1;
        let execution = Execution {
            id: state.next_execution_id,
            job_id,
            started_at: Utc::now(),
            completed_at: None,
            execution_time_ms: None,
            success: false,
            error_message: None,
        };
        state.executions.insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn update_execution(
        &self,
        id: DbId,
        update: &ExecutionUpdate,
    ) -> Result<Option<Execution>, StoreError> {
        let mut state = self.state.lock().await;
        let execution = state
            .executions
            .get_mut(&id)
            .ok_or_else(|| StoreError::execution_not_found(id))?;
        if execution.is_finalized() {
            return Ok(None);
        }
        execution.completed_at = Some(update.completed_at);
        execution.execution_time_ms = Some(update.execution_time_ms);
        execution.success = update.success;
        execution.error_message = update.error_message.clone();
        Ok(Some(execution.clone()))
    }

    async fn list_executions(&self, job_id: DbId) -> Result<Vec<Execution>, StoreError> {
        let state = self.state.lock().await;
        let mut executions: Vec<Execution> = state
            .executions
            .values()
            .filter(|execution| execution.job_id == job_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        Ok(executions)
    }
}
