//! Worker configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rally_models::JobId;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Maximum jobs waiting for a worker before submissions are rejected
    pub queue_capacity: usize,
    /// Job timeout
    pub job_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Directory for uploads and raw annotated videos
    pub upload_dir: PathBuf,
    /// Directory for converted, publicly served videos
    pub output_dir: PathBuf,
    /// Write buffer size for streaming uploads to disk
    pub upload_chunk_size: usize,
    /// Age after which outputs are deleted (zero disables the sweeper)
    pub output_retention: Duration,
    /// Maximum number of outputs kept
    pub output_max_files: usize,
    /// How often the output sweeper runs
    pub sweep_interval: Duration,
    /// Optional JSON course catalog; the built-in catalog is used otherwise
    pub course_catalog_path: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            queue_capacity: 16,
            job_timeout: Duration::from_secs(3600), // 1 hour
            shutdown_timeout: Duration::from_secs(30),
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            upload_chunk_size: 1024 * 1024,
            output_retention: Duration::from_secs(7 * 24 * 3600),
            output_max_files: 500,
            sweep_interval: Duration::from_secs(3600),
            course_catalog_path: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            queue_capacity: std::env::var("WORKER_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            job_timeout: Duration::from_secs(
                std::env::var("WORKER_JOB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            upload_dir: std::env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("outputs")),
            upload_chunk_size: std::env::var("UPLOAD_CHUNK_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024),
            output_retention: Duration::from_secs(
                std::env::var("OUTPUT_RETENTION_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(7 * 24 * 3600),
            ),
            output_max_files: std::env::var("OUTPUT_MAX_FILES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500),
            sweep_interval: Duration::from_secs(
                std::env::var("OUTPUT_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            course_catalog_path: std::env::var("COURSE_CATALOG_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Create the upload and output directories if missing.
    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::create_dir_all(&self.output_dir).await
    }

    /// File locations used by one job.
    pub fn paths_for(&self, id: &JobId) -> JobPaths {
        JobPaths::new(&self.upload_dir, &self.output_dir, id)
    }
}

/// File locations used by one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    /// The uploaded video
    pub upload: PathBuf,
    /// Annotated video before browser conversion
    pub raw: PathBuf,
    /// Converted video, kept after the job
    pub output: PathBuf,
}

impl JobPaths {
    pub fn new(upload_dir: &Path, output_dir: &Path, id: &JobId) -> Self {
        Self {
            upload: upload_dir.join(format!("{}.mp4", id)),
            raw: upload_dir.join(format!("{}_raw.mp4", id)),
            output: output_dir.join(output_file_name(id)),
        }
    }

    /// Files removed once the job finishes, whatever the outcome.
    pub fn transient(&self) -> [&Path; 2] {
        [&self.upload, &self.raw]
    }
}

/// Name of the served output for `id`.
pub fn output_file_name(id: &JobId) -> String {
    format!("{}_annotated.mp4", id)
}
