//! Job execution end to end, directly and through the executor.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use rally_media::{
    check_ffmpeg, check_ffprobe, MediaResult, ModelContext, PipelineConfig, VideoConverter,
};
use rally_models::{JobId, JobStatus};
use rally_queue::{JobStore, WorkQueue};
use rally_worker::{
    execute_job, CatalogRecommender, JobExecutor, JobOrchestrator, ProcessingContext,
    WorkerConfig,
};

/// Copies the raw video instead of re-encoding it.
struct CopyConverter;

#[async_trait]
impl VideoConverter for CopyConverter {
    async fn convert(&self, raw: &Path, output: &Path) -> MediaResult<PathBuf> {
        tokio::fs::copy(raw, output).await?;
        Ok(output.to_path_buf())
    }
}

fn context(dir: &Path, store: JobStore) -> (WorkerConfig, Arc<ProcessingContext>) {
    let config = WorkerConfig {
        upload_dir: dir.join("uploads"),
        output_dir: dir.join("outputs"),
        job_timeout: Duration::from_secs(30),
        shutdown_timeout: Duration::from_secs(5),
        ..WorkerConfig::default()
    };
    let pipeline = PipelineConfig::default();
    let ctx = ProcessingContext::new(
        config.clone(),
        pipeline.clone(),
        Arc::new(ModelContext::disabled(&pipeline)),
        store,
        Arc::new(CopyConverter),
        Arc::new(CatalogRecommender::default()),
    );
    (config, Arc::new(ctx))
}

/// Ten frames of the lavfi test pattern, or `None` without FFmpeg.
async fn write_sample_video(path: &Path) -> Option<()> {
    if check_ffmpeg().is_err() || check_ffprobe().is_err() {
        eprintln!("ffmpeg/ffprobe not installed, skipping");
        return None;
    }
    let status = tokio::process::Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y", "-f", "lavfi", "-i"])
        .arg("testsrc=size=64x48:rate=10")
        .args(["-t", "1", "-pix_fmt", "yuv420p", "-c:v", "mpeg4"])
        .arg(path)
        .status()
        .await
        .ok()?;
    status.success().then_some(())
}

#[tokio::test]
async fn test_successful_job_keeps_only_annotated_output() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::new();
    let (config, ctx) = context(dir.path(), store.clone());
    config.ensure_dirs().await.unwrap();

    let id = JobId::new();
    let paths = config.paths_for(&id);
    if write_sample_video(&paths.upload).await.is_none() {
        return;
    }
    store.create(id.clone()).await;

    execute_job(ctx, id.clone()).await;

    let job = store.get(&id).await.unwrap();
    assert_eq!(job.status, JobStatus::Success, "message: {:?}", job.message);
    assert!(job.error_kind.is_none());
    let outcome = job.result.expect("successful job carries an outcome");
    assert_eq!(outcome.video_url, format!("/outputs/{}_annotated.mp4", id));
    assert_eq!(outcome.details.frame_count, 10);
    assert!(outcome.details.detected_shots.is_empty());

    assert!(!paths.upload.exists());
    assert!(!paths.raw.exists());
    assert!(paths.output.exists());
    assert_eq!(
        paths.output.file_name().unwrap().to_string_lossy(),
        format!("{}_annotated.mp4", id)
    );
    assert!(std::fs::metadata(&paths.output).unwrap().len() > 0);
}

#[tokio::test]
async fn test_corrupt_upload_fails_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::new();
    let (config, ctx) = context(dir.path(), store.clone());
    config.ensure_dirs().await.unwrap();

    let id = JobId::new();
    let paths = config.paths_for(&id);
    std::fs::write(&paths.upload, b"definitely not an mp4").unwrap();
    std::fs::write(&paths.raw, b"stale").unwrap();
    store.create(id.clone()).await;

    execute_job(ctx, id.clone()).await;

    let job = store.get(&id).await.unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert!(!job.message.as_deref().unwrap_or_default().is_empty());
    assert!(job.details.is_some());
    assert!(job.error_kind.is_some());
    assert!(job.result.is_none());
    assert!(!paths.upload.exists());
    assert!(!paths.raw.exists());
}

#[tokio::test]
async fn test_job_not_pending_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::new();
    let (config, ctx) = context(dir.path(), store.clone());
    config.ensure_dirs().await.unwrap();

    let id = JobId::new();
    let paths = config.paths_for(&id);
    std::fs::write(&paths.upload, b"owned by the running job").unwrap();
    store.create(id.clone()).await;
    store.mark_processing(&id).await.unwrap();

    execute_job(ctx, id.clone()).await;
    assert_eq!(store.get(&id).await.unwrap().status, JobStatus::Processing);
    assert!(paths.upload.exists());
}

#[tokio::test]
async fn test_executor_runs_submitted_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobStore::new();
    let (config, ctx) = context(dir.path(), store.clone());
    config.ensure_dirs().await.unwrap();

    let (queue, receiver) = WorkQueue::bounded(config.queue_capacity);
    let orchestrator = JobOrchestrator::new(store.clone(), queue, config.clone());
    let executor = Arc::new(JobExecutor::new(config.clone()));
    let runner = {
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { executor.run(receiver, ctx).await })
    };

    let mut ids = Vec::new();
    for body in [&b"garbage one"[..], &b"garbage two"[..]] {
        let upload = stream::iter(vec![Ok::<_, std::convert::Infallible>(body)]);
        ids.push(orchestrator.submit(upload).await.unwrap());
    }

    for id in &ids {
        let mut job = orchestrator.status(id.as_str()).await.unwrap();
        for _ in 0..100 {
            if job.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            job = orchestrator.status(id.as_str()).await.unwrap();
        }
        assert_eq!(job.status, JobStatus::Error);
        assert!(!config.paths_for(id).upload.exists());
    }

    executor.shutdown();
    runner.await.unwrap();
    assert_eq!(executor.in_flight(), 0);
}
