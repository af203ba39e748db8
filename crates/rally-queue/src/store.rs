//! Shared job registry.

use std::collections::HashMap;
use std::sync::Arc;

use rally_models::{AnalysisOutcome, Job, JobErrorKind, JobId, JobStatus};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{QueueError, QueueResult};

/// Registry of all jobs known to this process.
///
/// Every mutation goes through a transition method that checks the job's
/// current status first.
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending job.
    pub async fn create(&self, id: JobId) -> Job {
        let job = Job::with_id(id.clone());
        self.jobs.write().await.insert(id, job.clone());
        debug!(job_id = %job.id, "Job created");
        job
    }

    /// Snapshot of a job.
    pub async fn get(&self, id: &JobId) -> QueueResult<Job> {
        self.jobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| QueueError::job_not_found(id.as_str()))
    }

    /// Forget a job entirely. Used when a submission is rolled back.
    pub async fn remove(&self, id: &JobId) -> Option<Job> {
        self.jobs.write().await.remove(id)
    }

    pub async fn mark_processing(&self, id: &JobId) -> QueueResult<Job> {
        self.transition(id, JobStatus::Processing, Job::start).await
    }

    pub async fn complete(&self, id: &JobId, outcome: AnalysisOutcome) -> QueueResult<Job> {
        self.transition(id, JobStatus::Success, |job| job.succeed(outcome))
            .await
    }

    pub async fn fail(
        &self,
        id: &JobId,
        kind: JobErrorKind,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> QueueResult<Job> {
        let (message, details) = (message.into(), details.into());
        self.transition(id, JobStatus::Error, |job| job.fail(kind, message, details))
            .await
    }

    async fn transition(
        &self,
        id: &JobId,
        next: JobStatus,
        apply: impl FnOnce(Job) -> Job,
    ) -> QueueResult<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::job_not_found(id.as_str()))?;

        if !job.status.can_transition_to(next) {
            warn!(
                job_id = %id,
                from = %job.status,
                to = %next,
                "Rejected illegal job transition"
            );
            return Err(QueueError::invalid_transition(id.as_str(), job.status, next));
        }

        *job = apply(job.clone());
        debug!(job_id = %id, status = %job.status, "Job transitioned");
        Ok(job.clone())
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
