//! Bounded in-process work queue.

use rally_models::JobId;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::error::{QueueError, QueueResult};

/// Producer side of the work queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    tx: mpsc::Sender<JobId>,
    capacity: usize,
}

/// Consumer side of the work queue.
#[derive(Debug)]
pub struct WorkReceiver {
    rx: mpsc::Receiver<JobId>,
}

impl WorkQueue {
    /// Create a queue holding at most `capacity` waiting jobs.
    pub fn bounded(capacity: usize) -> (Self, WorkReceiver) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, capacity }, WorkReceiver { rx })
    }

    /// Enqueue without waiting. Fails with `QueueFull` when the queue is at
    /// capacity.
    pub fn try_enqueue(&self, id: JobId) -> QueueResult<()> {
        match self.tx.try_send(id) {
            Ok(()) => {
                debug!(waiting = self.waiting(), "Job enqueued");
                Ok(())
            }
            Err(TrySendError::Full(id)) => {
                warn!(job_id = %id, capacity = self.capacity, "Work queue full");
                Err(QueueError::QueueFull(self.capacity))
            }
            Err(TrySendError::Closed(_)) => Err(QueueError::QueueClosed),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs enqueued but not yet taken by a worker.
    pub fn waiting(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl WorkReceiver {
    /// Next job, or `None` once every producer is dropped and the queue is
    /// drained.
    pub async fn recv(&mut self) -> Option<JobId> {
        self.rx.recv().await
    }

    /// Stop accepting new jobs. Already queued jobs can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_when_full() {
        let (queue, mut rx) = WorkQueue::bounded(2);
        queue.try_enqueue(JobId::from_string("a")).unwrap();
        queue.try_enqueue(JobId::from_string("b")).unwrap();
        assert_eq!(queue.waiting(), 2);
        assert!(matches!(
            queue.try_enqueue(JobId::from_string("c")),
            Err(QueueError::QueueFull(2))
        ));

        assert_eq!(rx.recv().await.unwrap().as_str(), "a");
        assert_eq!(queue.waiting(), 1);
        queue.try_enqueue(JobId::from_string("c")).unwrap();
        assert_eq!(rx.recv().await.unwrap().as_str(), "b");
        assert_eq!(rx.recv().await.unwrap().as_str(), "c");
    }

    #[tokio::test]
    async fn test_closed_queue() {
        let (queue, mut rx) = WorkQueue::bounded(1);
        rx.close();
        assert!(matches!(
            queue.try_enqueue(JobId::new()),
            Err(QueueError::QueueClosed)
        ));
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn test_recv_ends_after_producers_drop() {
        let (queue, mut rx) = WorkQueue::bounded(4);
        queue.try_enqueue(JobId::from_string("x")).unwrap();
        drop(queue);
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }
}
