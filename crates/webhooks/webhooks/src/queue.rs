//! Webhook queue abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::delivery::WebhookJob;

/// Number of finished jobs kept per outcome by [`InMemoryQueue`].
pub const MAX_FINISHED: usize = 1000;

/// Error type for queue operations.
#[derive(Debug, Clone, Error)]
#[error("Queue error: {0}")]
pub struct QueueError(pub String);

/// Trait for webhook job queues.
#[async_trait]
pub trait WebhookQueue: Send + Sync {
    /// Enqueues a job for delivery.
    async fn enqueue(&self, job: WebhookJob) -> Result<(), QueueError>;

    /// Dequeues the next job whose `next_attempt` has passed.
    async fn dequeue(&self) -> Result<Option<WebhookJob>, QueueError>;

    /// Records a delivered job.
    async fn mark_complete(&self, job: WebhookJob) -> Result<(), QueueError>;

    /// Records a job that exhausted its attempts.
    async fn mark_failed(&self, job: WebhookJob) -> Result<(), QueueError>;

    /// Puts a job back for a later attempt.
    async fn schedule_retry(&self, job: WebhookJob) -> Result<(), QueueError>;

    /// Gets a pending job by ID.
    async fn get_job(&self, job_id: Uuid) -> Result<Option<WebhookJob>, QueueError>;

    /// Gets all pending jobs.
    async fn pending_jobs(&self) -> Result<Vec<WebhookJob>, QueueError>;

    /// Earliest `next_attempt` among pending jobs.
    async fn next_due(&self) -> Result<Option<DateTime<Utc>>, QueueError> {
        Ok(self
            .pending_jobs()
            .await?
            .iter()
            .map(|job| job.next_attempt)
            .min())
    }

    /// Gets the number of pending jobs.
    async fn len(&self) -> Result<usize, QueueError>;

    /// Checks if the queue is empty.
    async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }

    /// Clears all jobs from the queue.
    async fn clear(&self) -> Result<(), QueueError>;
}

/// In-memory webhook queue implementation.
///
/// Keeps the most recent [`MAX_FINISHED`] completed and failed jobs.
pub struct InMemoryQueue {
    jobs: RwLock<VecDeque<WebhookJob>>,
    completed: RwLock<VecDeque<WebhookJob>>,
    failed: RwLock<VecDeque<WebhookJob>>,
}

impl InMemoryQueue {
    /// Creates a new in-memory queue.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(VecDeque::new()),
            completed: RwLock::new(VecDeque::new()),
            failed: RwLock::new(VecDeque::new()),
        }
    }

    /// Creates a shared in-memory queue.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Jobs delivered successfully.
    pub async fn completed_jobs(&self) -> Vec<WebhookJob> {
        self.completed.read().await.iter().cloned().collect()
    }

    /// Jobs that failed terminally.
    pub async fn failed_jobs(&self) -> Vec<WebhookJob> {
        self.failed.read().await.iter().cloned().collect()
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookQueue for InMemoryQueue {
    async fn enqueue(&self, job: WebhookJob) -> Result<(), QueueError> {
        self.jobs.write().await.push_back(job);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<WebhookJob>, QueueError> {
        let mut jobs = self.jobs.write().await;
        let now = Utc::now();

        let ready_idx = jobs.iter().position(|j| j.next_attempt <= now);

        Ok(ready_idx.and_then(|idx| jobs.remove(idx)))
    }

    async fn mark_complete(&self, job: WebhookJob) -> Result<(), QueueError> {
        push_bounded(&mut *self.completed.write().await, job);
        Ok(())
    }

    async fn mark_failed(&self, job: WebhookJob) -> Result<(), QueueError> {
        push_bounded(&mut *self.failed.write().await, job);
        Ok(())
    }

    async fn schedule_retry(&self, job: WebhookJob) -> Result<(), QueueError> {
        self.jobs.write().await.push_back(job);
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<WebhookJob>, QueueError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.iter().find(|j| j.id == job_id).cloned())
    }

    async fn pending_jobs(&self) -> Result<Vec<WebhookJob>, QueueError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.iter().cloned().collect())
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.jobs.read().await.len())
    }

    async fn clear(&self) -> Result<(), QueueError> {
        self.jobs.write().await.clear();
        self.completed.write().await.clear();
        self.failed.write().await.clear();
        Ok(())
    }
}

fn push_bounded(finished: &mut VecDeque<WebhookJob>, job: WebhookJob) {
    finished.push_back(job);
    if finished.len() > MAX_FINISHED {
        finished.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::tests::sample_job;

    #[tokio::test]
    async fn test_in_memory_queue() {
        let queue = InMemoryQueue::new();
        let job = sample_job("https://example.com/hook");

        queue.enqueue(job.clone()).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 1);
        assert!(queue.get_job(job.id).await.unwrap().is_some());

        let dequeued = queue.dequeue().await.unwrap();
        assert_eq!(dequeued.unwrap().id, job.id);

        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_queue_respects_next_attempt() {
        let queue = InMemoryQueue::new();

        let mut job = sample_job("https://example.com/hook");
        job.next_attempt = Utc::now() + chrono::Duration::hours(1);
        let due = job.next_attempt;

        queue.enqueue(job).await.unwrap();

        // Should not dequeue because next_attempt is in the future
        assert!(queue.dequeue().await.unwrap().is_none());
        assert_eq!(queue.next_due().await.unwrap(), Some(due));
    }

    #[tokio::test]
    async fn test_completed_and_failed_are_tracked() {
        let queue = InMemoryQueue::new();
        queue.mark_complete(sample_job("https://a.example")).await.unwrap();
        queue.mark_failed(sample_job("https://b.example")).await.unwrap();

        assert_eq!(queue.completed_jobs().await.len(), 1);
        assert_eq!(queue.failed_jobs().await[0].url, "https://b.example");

        queue.clear().await.unwrap();
        assert!(queue.failed_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_finished_jobs_are_bounded() {
        let queue = InMemoryQueue::new();
        let mut last = None;
        for _ in 0..MAX_FINISHED + 50 {
            let job = sample_job("https://a.example");
            last = Some(job.id);
            queue.mark_complete(job.clone()).await.unwrap();
            queue.mark_failed(job).await.unwrap();
        }

        let completed = queue.completed_jobs().await;
        assert_eq!(completed.len(), MAX_FINISHED);
        assert_eq!(completed.last().map(|j| j.id), last);
        assert_eq!(queue.failed_jobs().await.len(), MAX_FINISHED);
    }
}
