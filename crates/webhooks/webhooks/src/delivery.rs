//! Webhook delivery job and engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::client::WebhookClient;
use crate::endpoint::{Endpoint, EndpointId};
use crate::error::{WebhookError, WebhookResult};
use crate::payload::Envelope;
use crate::queue::WebhookQueue;
use crate::retry::RetryStrategy;

/// Number of attempt records kept in memory.
const MAX_HISTORY: usize = 1000;

/// Webhook delivery job: one envelope to one endpoint.
#[derive(Debug, Clone)]
pub struct WebhookJob {
    /// Job ID.
    pub id: Uuid,
    /// Endpoint ID.
    pub endpoint_id: EndpointId,
    /// Target URL.
    pub url: String,
    /// Envelope shared with the other jobs of the dispatch.
    pub envelope: Arc<Envelope>,
    /// Serialized envelope, sent unchanged on every attempt.
    pub body: Arc<str>,
    /// Signature header value for `body`.
    pub signature: String,
    /// Number of attempts made.
    pub attempts: u32,
    /// Maximum attempts.
    pub max_attempts: u32,
    /// Next attempt time.
    pub next_attempt: DateTime<Utc>,
    /// Created at.
    pub created_at: DateTime<Utc>,
    /// Last error message.
    pub last_error: Option<String>,
    /// Status.
    pub status: WebhookJobStatus,
}

/// Webhook job status.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WebhookJobStatus {
    /// Waiting to be processed.
    Pending,
    /// Currently being processed.
    Processing,
    /// Successfully delivered.
    Completed,
    /// Failed after all attempts.
    Failed,
}

impl WebhookJob {
    /// Creates a pending job for an endpoint.
    pub fn new(
        endpoint: &Endpoint,
        envelope: Arc<Envelope>,
        body: Arc<str>,
        signature: String,
        max_attempts: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            endpoint_id: endpoint.id,
            url: endpoint.url.clone(),
            envelope,
            body,
            signature,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            next_attempt: now,
            created_at: now,
            last_error: None,
            status: WebhookJobStatus::Pending,
        }
    }

    /// Marks the job as processing.
    pub fn mark_processing(&mut self) {
        self.status = WebhookJobStatus::Processing;
    }

    /// Marks the job as completed.
    pub fn mark_completed(&mut self) {
        self.attempts += 1;
        self.last_error = None;
        self.status = WebhookJobStatus::Completed;
    }

    /// Records a failed attempt and schedules the next one if allowed.
    ///
    /// Returns `true` if the job should go back to the queue.
    pub fn record_failure(&mut self, error: impl Into<String>, strategy: &dyn RetryStrategy) -> bool {
        self.attempts += 1;
        self.last_error = Some(error.into());

        if self.attempts >= self.max_attempts {
            self.status = WebhookJobStatus::Failed;
            return false;
        }

        match strategy.next_delay(self.attempts) {
            Some(delay) => {
                self.next_attempt =
                    Utc::now() + chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                self.status = WebhookJobStatus::Pending;
                true
            }
            None => {
                self.status = WebhookJobStatus::Failed;
                false
            }
        }
    }

    /// Checks if the job can be retried.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts && self.status == WebhookJobStatus::Pending
    }
}

/// Record of one delivery attempt.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookDelivery {
    /// Delivery ID.
    pub id: Uuid,
    /// Job ID.
    pub job_id: Uuid,
    /// Envelope ID.
    pub envelope_id: Uuid,
    /// Endpoint ID.
    pub endpoint_id: EndpointId,
    /// Target URL.
    pub url: String,
    /// Event key.
    pub event_key: String,
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// HTTP status code (if received).
    pub status_code: Option<u16>,
    /// Response body (truncated).
    pub response_body: Option<String>,
    /// Error message (if failed).
    pub error: Option<String>,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// When the delivery was attempted.
    pub created_at: DateTime<Utc>,
}

impl WebhookDelivery {
    fn new(job: &WebhookJob, duration_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: job.id,
            envelope_id: job.envelope.id,
            endpoint_id: job.endpoint_id,
            url: job.url.clone(),
            event_key: job.envelope.event_key.clone(),
            attempt: job.attempts + 1,
            status_code: None,
            response_body: None,
            error: None,
            duration_ms,
            created_at: Utc::now(),
        }
    }

    /// Creates a successful delivery record.
    pub fn success(job: &WebhookJob, status_code: u16, response_body: String, duration_ms: u64) -> Self {
        Self {
            status_code: Some(status_code),
            response_body: Some(response_body),
            ..Self::new(job, duration_ms)
        }
    }

    /// Creates a failed delivery record.
    pub fn failure(job: &WebhookJob, error: &WebhookError, duration_ms: u64) -> Self {
        let status_code = match error {
            WebhookError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        };
        Self {
            status_code,
            error: Some(error.to_string()),
            ..Self::new(job, duration_ms)
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Webhook delivery engine.
///
/// Jobs are queued by [`DeliveryEngine::submit`] and delivered by
/// [`DeliveryEngine::process_next`], either from a [`WorkerPool`] or from
/// [`DeliveryEngine::drain`].
pub struct DeliveryEngine {
    queue: Arc<dyn WebhookQueue>,
    retry_strategy: Arc<dyn RetryStrategy>,
    client: WebhookClient,
    history: RwLock<VecDeque<WebhookDelivery>>,
    wakeup: Notify,
}

impl DeliveryEngine {
    /// Creates a new delivery engine.
    pub fn new(
        queue: Arc<dyn WebhookQueue>,
        retry_strategy: Arc<dyn RetryStrategy>,
        client: WebhookClient,
    ) -> Self {
        Self {
            queue,
            retry_strategy,
            client,
            history: RwLock::new(VecDeque::new()),
            wakeup: Notify::new(),
        }
    }

    /// Attempts allowed per job by the retry strategy.
    pub fn max_attempts(&self) -> u32 {
        self.retry_strategy.max_attempts()
    }

    /// Enqueues a job for asynchronous delivery.
    pub async fn submit(&self, job: WebhookJob) -> WebhookResult<()> {
        self.queue.enqueue(job).await?;
        self.wakeup.notify_one();
        Ok(())
    }

    /// Processes the next ready job in the queue.
    ///
    /// Returns `None` when no job is ready.
    pub async fn process_next(&self) -> WebhookResult<Option<WebhookDelivery>> {
        let Some(mut job) = self.queue.dequeue().await? else {
            return Ok(None);
        };
        job.mark_processing();

        let delivery = self.attempt(&job).await;

        if delivery.is_success() {
            tracing::info!(
                endpoint_id = %job.endpoint_id,
                url = %job.url,
                event_key = %job.envelope.event_key,
                envelope_id = %job.envelope.id,
                attempt = delivery.attempt,
                "Webhook delivered"
            );
            job.mark_completed();
            self.queue.mark_complete(job).await?;
        } else {
            let error = delivery.error.clone().unwrap_or_default();
            if job.record_failure(error.clone(), self.retry_strategy.as_ref()) {
                tracing::warn!(
                    endpoint_id = %job.endpoint_id,
                    url = %job.url,
                    attempt = job.attempts,
                    next_attempt = %job.next_attempt,
                    error = %error,
                    "Webhook delivery failed, retrying"
                );
                self.queue.schedule_retry(job).await?;
            } else {
                tracing::error!(
                    endpoint_id = %job.endpoint_id,
                    url = %job.url,
                    event_key = %job.envelope.event_key,
                    attempts = job.attempts,
                    error = %error,
                    "Webhook delivery failed permanently"
                );
                self.queue.mark_failed(job).await?;
            }
        }

        Ok(Some(delivery))
    }

    /// Sends a job exactly once, bypassing the queue and the retry strategy.
    pub async fn send_once(&self, job: &WebhookJob) -> WebhookDelivery {
        self.attempt(job).await
    }

    /// Processes jobs until the queue is empty, waiting for scheduled retries.
    ///
    /// Returns the number of attempts made.
    pub async fn drain(&self) -> WebhookResult<usize> {
        let mut attempts = 0;
        loop {
            if self.process_next().await?.is_some() {
                attempts += 1;
                continue;
            }
            match self.queue.next_due().await? {
                Some(due) => {
                    let wait = (due - Utc::now()).to_std().unwrap_or_default();
                    tokio::time::sleep(wait).await;
                }
                None => return Ok(attempts),
            }
        }
    }

    /// Starts `workers` tasks delivering queued jobs.
    pub fn start(self: &Arc<Self>, workers: usize, poll_interval: Duration) -> WorkerPool {
        let (shutdown, _) = watch::channel(false);
        let handles = (0..workers.max(1))
            .map(|worker| {
                let engine = Arc::clone(self);
                let mut stop = shutdown.subscribe();
                tokio::spawn(async move {
                    tracing::debug!(worker, "Webhook worker started");
                    loop {
                        if *stop.borrow() {
                            break;
                        }
                        match engine.process_next().await {
                            Ok(Some(_)) => continue,
                            Ok(None) => {}
                            Err(e) => tracing::error!(worker, error = %e, "Webhook worker error"),
                        }
                        tokio::select! {
                            changed = stop.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                            }
                            _ = engine.wakeup.notified() => {}
                            _ = tokio::time::sleep(poll_interval) => {}
                        }
                    }
                    tracing::debug!(worker, "Webhook worker stopped");
                })
            })
            .collect();

        WorkerPool { shutdown, handles }
    }

    /// Most recent attempt records, oldest first.
    pub async fn recent_deliveries(&self) -> Vec<WebhookDelivery> {
        self.history.read().await.iter().cloned().collect()
    }

    /// Gets the queue.
    pub fn queue(&self) -> &Arc<dyn WebhookQueue> {
        &self.queue
    }

    async fn attempt(&self, job: &WebhookJob) -> WebhookDelivery {
        let start = std::time::Instant::now();
        let delivery = match self.client.send(job).await {
            Ok(response) => {
                WebhookDelivery::success(job, response.status, response.body, response.duration_ms)
            }
            Err(e) => WebhookDelivery::failure(job, &e, start.elapsed().as_millis() as u64),
        };

        let mut history = self.history.write().await;
        history.push_back(delivery.clone());
        if history.len() > MAX_HISTORY {
            history.pop_front();
        }

        delivery
    }
}

/// Running delivery workers.
pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Number of worker tasks.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stops the workers after their current job and waits for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
