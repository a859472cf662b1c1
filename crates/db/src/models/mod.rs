//! Row models and DTOs for the `jobs` and `job_executions` tables.

pub mod execution;
pub mod job;
