//! Job submission and status lookup.

use std::fmt::Display;
use std::path::Path;

use futures_util::{Stream, StreamExt};
use rally_models::{Job, JobId};
use rally_queue::{JobStore, QueueError, WorkQueue};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::error::OrchestratorError;

/// Front door for the API: stores uploads, creates jobs and hands them to
/// the work queue.
#[derive(Debug, Clone)]
pub struct JobOrchestrator {
    store: JobStore,
    queue: WorkQueue,
    config: WorkerConfig,
}

impl JobOrchestrator {
    pub fn new(store: JobStore, queue: WorkQueue, config: WorkerConfig) -> Self {
        Self {
            store,
            queue,
            config,
        }
    }

    /// Persist an uploaded video and enqueue a job for it.
    pub async fn submit<S, B, E>(&self, upload: S) -> Result<JobId, OrchestratorError>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Display,
    {
        let job_id = JobId::new();
        let paths = self.config.paths_for(&job_id);

        info!(job_id = %job_id, "Starting upload");
        let bytes = match persist(upload, &paths.upload, self.config.upload_chunk_size).await {
            Ok(bytes) => bytes,
            Err(reason) => {
                error!(job_id = %job_id, "Failed to save upload: {}", reason);
                remove_quietly(&paths.upload).await;
                return Err(OrchestratorError::UploadPersist(reason));
            }
        };
        info!(job_id = %job_id, size_bytes = bytes, "Upload saved");

        self.store.create(job_id.clone()).await;

        if let Err(e) = self.queue.try_enqueue(job_id.clone()) {
            warn!(job_id = %job_id, "Rejecting job: {}", e);
            self.store.remove(&job_id).await;
            remove_quietly(&paths.upload).await;
            return Err(match e {
                QueueError::QueueFull(_) | QueueError::QueueClosed => OrchestratorError::Busy,
                other => OrchestratorError::UploadPersist(other.to_string()),
            });
        }

        metrics::counter!("rally_jobs_submitted_total").increment(1);
        Ok(job_id)
    }

    /// Current state of a job.
    pub async fn status(&self, job_id: &str) -> Result<Job, OrchestratorError> {
        self.store
            .get(&JobId::from_string(job_id))
            .await
            .map_err(|_| OrchestratorError::NotFound(job_id.to_string()))
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }
}

/// Stream `upload` to `path`. Returns the byte count, or a description of
/// what went wrong.
async fn persist<S, B, E>(mut upload: S, path: &Path, chunk_size: usize) -> Result<u64, String>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    let file = tokio::fs::File::create(path)
        .await
        .map_err(|e| format!("create {}: {}", path.display(), e))?;
    let mut writer = BufWriter::with_capacity(chunk_size.max(1), file);
    let mut written = 0u64;

    while let Some(chunk) = upload.next().await {
        let chunk = chunk.map_err(|e| format!("read upload: {}", e))?;
        let chunk = chunk.as_ref();
        writer
            .write_all(chunk)
            .await
            .map_err(|e| format!("write {}: {}", path.display(), e))?;
        written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| format!("flush {}: {}", path.display(), e))?;
    Ok(written)
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "Failed to remove partial upload: {}", e);
        }
    }
}
