//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};

use rally_queue::WorkReceiver;

use crate::config::WorkerConfig;
use crate::processor::{execute_job, ProcessingContext};

/// Pulls job IDs off the work queue and runs them, at most
/// `max_concurrent_jobs` at a time.
pub struct JobExecutor {
    config: WorkerConfig,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            job_semaphore,
            shutdown,
        }
    }

    /// Consume the queue until shutdown is signalled or every producer is
    /// gone, then wait for in-flight jobs.
    pub async fn run(&self, mut receiver: WorkReceiver, ctx: Arc<ProcessingContext>) {
        info!(
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            queue_capacity = self.config.queue_capacity,
            "Starting job executor"
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            // Wait for a free slot before taking work, so waiting jobs stay
            // in the bounded queue and back-pressure reaches submitters.
            let permit = tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                    continue;
                }
                permit = Arc::clone(&self.job_semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let job_id = tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                    continue;
                }
                next = receiver.recv() => match next {
                    Some(id) => id,
                    None => {
                        debug!("Work queue closed");
                        break;
                    }
                },
            };

            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                let _permit = permit;
                execute_job(ctx, job_id).await;
            });
        }

        receiver.close();

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                in_flight = self.in_flight(),
                "Shutdown timeout reached with jobs still running"
            );
        }

        info!("Job executor stopped");
    }

    /// Jobs currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.config.max_concurrent_jobs.max(1) - self.job_semaphore.available_permits()
    }

    async fn wait_for_jobs(&self) {
        while self.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// A receiver that flips to `true` on shutdown, for sibling tasks.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}
