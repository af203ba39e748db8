//! Submission, status and back-pressure behaviour of the orchestrator.

use std::convert::Infallible;
use std::path::Path;

use futures_util::stream;
use rally_models::JobStatus;
use rally_queue::{JobStore, WorkQueue};
use rally_worker::{JobOrchestrator, OrchestratorError, WorkerConfig};

fn config(dir: &Path) -> WorkerConfig {
    WorkerConfig {
        upload_dir: dir.join("uploads"),
        output_dir: dir.join("outputs"),
        upload_chunk_size: 4,
        ..WorkerConfig::default()
    }
}

fn chunks(parts: &[&'static [u8]]) -> impl futures_util::Stream<Item = Result<&'static [u8], Infallible>> + Unpin {
    stream::iter(parts.to_vec().into_iter().map(Ok))
}

#[tokio::test]
async fn test_submit_persists_upload_and_enqueues() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    config.ensure_dirs().await.unwrap();
    let (queue, mut receiver) = WorkQueue::bounded(4);
    let orchestrator = JobOrchestrator::new(JobStore::new(), queue, config.clone());

    let id = orchestrator
        .submit(chunks(&[b"hello ", b"rally ", b"video"]))
        .await
        .unwrap();

    let saved = std::fs::read(config.paths_for(&id).upload).unwrap();
    assert_eq!(saved, b"hello rally video");

    let job = orchestrator.status(id.as_str()).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(receiver.recv().await.unwrap(), id);
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (queue, _receiver) = WorkQueue::bounded(1);
    let orchestrator = JobOrchestrator::new(JobStore::new(), queue, config(dir.path()));

    let err = orchestrator.status("does-not-exist").await.unwrap_err();
    assert!(matches!(err, OrchestratorError::NotFound(_)));
}

#[tokio::test]
async fn test_full_queue_rejects_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    config.ensure_dirs().await.unwrap();
    let (queue, _receiver) = WorkQueue::bounded(1);
    let store = JobStore::new();
    let orchestrator = JobOrchestrator::new(store.clone(), queue, config.clone());

    orchestrator.submit(chunks(&[b"first"])).await.unwrap();
    let err = orchestrator.submit(chunks(&[b"second"])).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Busy));

    assert_eq!(store.len().await, 1);
    let uploads = std::fs::read_dir(&config.upload_dir).unwrap().count();
    assert_eq!(uploads, 1);
}

#[tokio::test]
async fn test_failed_upload_leaves_no_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    config.ensure_dirs().await.unwrap();
    let (queue, _receiver) = WorkQueue::bounded(4);
    let store = JobStore::new();
    let orchestrator = JobOrchestrator::new(store.clone(), queue, config.clone());

    let broken = stream::iter(vec![
        Ok::<&'static [u8], String>(b"partial data"),
        Err("connection reset".to_string()),
    ]);
    let err = orchestrator.submit(broken).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::UploadPersist(_)));

    assert!(store.is_empty().await);
    assert_eq!(std::fs::read_dir(&config.upload_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_missing_upload_dir_is_persist_error() {
    let dir = tempfile::tempdir().unwrap();
    let (queue, _receiver) = WorkQueue::bounded(4);
    let orchestrator = JobOrchestrator::new(JobStore::new(), queue, config(dir.path()));

    let err = orchestrator.submit(chunks(&[b"data"])).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::UploadPersist(_)));
}

#[tokio::test]
async fn test_concurrent_submissions_get_distinct_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    config.ensure_dirs().await.unwrap();
    let (queue, _receiver) = WorkQueue::bounded(4);
    let orchestrator = JobOrchestrator::new(JobStore::new(), queue, config.clone());

    let (a, b) = tokio::join!(
        orchestrator.submit(chunks(&[b"aaaa", b"aaaa"])),
        orchestrator.submit(chunks(&[b"bb"])),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a, b);
    assert_eq!(std::fs::read(config.paths_for(&a).upload).unwrap(), b"aaaaaaaa");
    assert_eq!(std::fs::read(config.paths_for(&b).upload).unwrap(), b"bb");
}
