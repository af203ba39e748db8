//! Runs one analysis job end to end.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rally_media::{analyze_file, ModelContext, PipelineConfig, VideoConverter};
use rally_models::{AnalysisOutcome, JobId};
use rally_queue::JobStore;
use tracing::{debug, warn, Instrument};

use crate::config::{JobPaths, WorkerConfig};
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::recommender::CourseRecommender;

/// Everything a job needs, shared by all jobs.
pub struct ProcessingContext {
    pub config: WorkerConfig,
    pub pipeline: PipelineConfig,
    pub models: Arc<ModelContext>,
    pub store: JobStore,
    pub converter: Arc<dyn VideoConverter>,
    pub recommender: Arc<dyn CourseRecommender>,
}

impl ProcessingContext {
    pub fn new(
        config: WorkerConfig,
        pipeline: PipelineConfig,
        models: Arc<ModelContext>,
        store: JobStore,
        converter: Arc<dyn VideoConverter>,
        recommender: Arc<dyn CourseRecommender>,
    ) -> Self {
        Self {
            config,
            pipeline,
            models,
            store,
            converter,
            recommender,
        }
    }
}

/// Removes a job's transient files when dropped.
struct TransientFiles(Vec<PathBuf>);

impl TransientFiles {
    fn new(paths: &JobPaths) -> Self {
        Self(paths.transient().iter().map(|p| p.to_path_buf()).collect())
    }
}

impl Drop for TransientFiles {
    fn drop(&mut self) {
        for path in &self.0 {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed transient file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), "Failed to remove transient file: {}", e),
            }
        }
    }
}

/// Execute one job and record its outcome on the store.
///
/// Never returns an error: every failure ends up on the job record.
pub async fn execute_job(ctx: Arc<ProcessingContext>, job_id: JobId) {
    let logger = JobLogger::new(&job_id, "analyze_video");
    let span = logger.create_span();
    run_job(ctx, job_id, logger).instrument(span).await
}

async fn run_job(ctx: Arc<ProcessingContext>, job_id: JobId, logger: JobLogger) {
    let paths = ctx.config.paths_for(&job_id);

    // Only the dispatch that claims the job owns its files.
    if let Err(e) = ctx.store.mark_processing(&job_id).await {
        logger.log_error(&format!("Could not start job: {}", e));
        return;
    }
    let _transient = TransientFiles::new(&paths);
    logger.log_start(&paths.upload.display().to_string());

    let started = Instant::now();
    let cancel = Arc::new(AtomicBool::new(false));
    let mut work = tokio::spawn(run_stages(
        Arc::clone(&ctx),
        job_id.clone(),
        paths.clone(),
        Arc::clone(&cancel),
        logger.clone(),
    ));

    let result = match tokio::time::timeout(ctx.config.job_timeout, &mut work).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(WorkerError::internal(format!("Job task aborted: {}", join_err))),
        Err(_) => {
            cancel.store(true, Ordering::Relaxed);
            work.abort();
            Err(WorkerError::Timeout(ctx.config.job_timeout.as_secs()))
        }
    };

    let elapsed = started.elapsed().as_secs_f64();
    metrics::histogram!("rally_job_duration_seconds").record(elapsed);

    match result {
        Ok(outcome) => {
            let summary = format!(
                "{} frames, {} shots in {:.1}s",
                outcome.details.frame_count,
                outcome.details.detected_shots.len(),
                elapsed
            );
            match ctx.store.complete(&job_id, outcome).await {
                Ok(_) => {
                    metrics::counter!("rally_jobs_completed_total").increment(1);
                    logger.log_completion(&summary);
                }
                Err(e) => logger.log_error(&format!("Could not record success: {}", e)),
            }
        }
        Err(err) => {
            let kind = err.kind();
            metrics::counter!("rally_jobs_failed_total", "kind" => kind.as_str()).increment(1);
            logger.log_error(&format!("{} ({})", err, kind.as_str()));
            if let Err(e) = ctx
                .store
                .fail(&job_id, kind, err.to_string(), err.details())
                .await
            {
                logger.log_error(&format!("Could not record failure: {}", e));
            }
        }
    }
}

async fn run_stages(
    ctx: Arc<ProcessingContext>,
    job_id: JobId,
    paths: JobPaths,
    cancel: Arc<AtomicBool>,
    logger: JobLogger,
) -> WorkerResult<AnalysisOutcome> {
    let result = analyze_file(
        Arc::clone(&ctx.models),
        ctx.pipeline.clone(),
        paths.upload.clone(),
        paths.raw.clone(),
        cancel,
    )
    .await
    .map_err(WorkerError::from_pipeline)?;
    logger.log_progress(&format!("analyzed {} frames", result.frame_count));

    ctx.converter
        .convert(&paths.raw, &paths.output)
        .await
        .map_err(WorkerError::Conversion)?;
    logger.log_progress("converted annotated video");

    let courses = ctx
        .recommender
        .recommend(&result.errors, result.detected_shot.as_ref())?;

    Ok(AnalysisOutcome::new(job_id.as_str(), result, courses))
}
