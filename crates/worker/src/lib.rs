//! Dispatch engine: the scheduler loop, the bounded worker pool that runs
//! claimed jobs, and the intake helper collaborators use to enqueue work.

pub mod body;
pub mod config;
pub mod error;
pub mod intake;
pub mod pool;
pub mod scheduler;

pub use body::{JobBody, SimulatedWork};
pub use config::{DatabaseConfig, SchedulerConfig};
pub use error::{BodyError, WorkerError};
pub use intake::submit_job;
pub use scheduler::Scheduler;
