//! The work a dispatched job performs.

use async_trait::async_trait;
use jobsched_db::models::job::Job;

use crate::error::BodyError;

/// Runs the body of one claimed job.
///
/// Returning `Err` (or panicking) marks the job Failed.
#[async_trait]
pub trait JobBody: Send + Sync {
    async fn run(&self, job: &Job) -> Result<(), BodyError>;
}

/// Default body: sleeps for the job's estimated duration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedWork;

#[async_trait]
impl JobBody for SimulatedWork {
    async fn run(&self, job: &Job) -> Result<(), BodyError> {
        tokio::time::sleep(job.estimated_duration()).await;
        Ok(())
    }
}
