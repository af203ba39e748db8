//! Queue error types.

use rally_models::JobStatus;
use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Work queue is full ({0} jobs waiting)")]
    QueueFull(usize),

    #[error("Work queue is closed")]
    QueueClosed,
}

impl QueueError {
    pub fn job_not_found(id: impl Into<String>) -> Self {
        Self::JobNotFound(id.into())
    }

    pub fn invalid_transition(job_id: impl Into<String>, from: JobStatus, to: JobStatus) -> Self {
        Self::InvalidTransition {
            job_id: job_id.into(),
            from,
            to,
        }
    }
}
