//! Worker pool draining the job queue in queue-backed mode.
//!
//! Each worker polls for a job, runs the coordinator and acknowledges the
//! delivery. Retryable failures are re-enqueued with exponential backoff
//! until the retry policy is exhausted, then dead-lettered.

use crate::coordinator::{Coordinator, RunOutcome};
use crate::supervisor::panic_message;
use crate::telemetry::PipelineTelemetry;
use errors::StorageError;
use futures_util::FutureExt;
use stash_core::jobs::{JobDelivery, RetryPolicy};
use stash_core::traits::JobQueue;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum JobDisposition {
    Completed,
    AlreadyCompleted,
    Retried { attempt: u32, delay: Duration },
    DeadLettered { reason: String },
}

pub struct WorkerPool {
    queue: Arc<dyn JobQueue>,
    coordinator: Arc<Coordinator>,
    retry: RetryPolicy,
    workers: usize,
    poll_timeout: Duration,
    telemetry: PipelineTelemetry,
}

/// Running workers. Dropping it does not stop them; cancel the token.
pub struct WorkerHandle {
    tracker: TaskTracker,
}

impl WorkerHandle {
    /// Waits until every worker has exited.
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    /// Waits up to `deadline`; returns whether all workers exited.
    pub async fn wait_for(&self, deadline: Duration) -> bool {
        tokio::time::timeout(deadline, self.tracker.wait())
            .await
            .is_ok()
    }
}

impl WorkerPool {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        coordinator: Arc<Coordinator>,
        retry: RetryPolicy,
        workers: usize,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            coordinator,
            retry,
            workers: workers.max(1),
            poll_timeout,
            telemetry: PipelineTelemetry::new(),
        }
    }

    /// Spawns the workers. They stop taking new jobs once `shutdown` is
    /// cancelled; a job already running finishes first.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> WorkerHandle {
        let tracker = TaskTracker::new();
        for worker_id in 0..self.workers {
            let pool = self.clone();
            let shutdown = shutdown.clone();
            tracker.spawn(async move { pool.run_worker(worker_id, shutdown).await });
        }
        tracker.close();
        tracing::info!(workers = self.workers, "Worker pool started");
        WorkerHandle { tracker }
    }

    async fn run_worker(&self, worker_id: usize, shutdown: CancellationToken) {
        tracing::debug!(worker_id, "Worker started");
        loop {
            let polled = tokio::select! {
                _ = shutdown.cancelled() => break,
                polled = self.queue.poll(self.poll_timeout) => polled,
            };
            match polled {
                Ok(Some(delivery)) => {
                    self.handle(delivery).await;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(worker_id, error = %e, "Queue poll failed");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                    }
                }
            }
        }
        tracing::debug!(worker_id, "Worker stopped");
    }

    /// Polls once and handles the delivery, if any.
    pub async fn run_once(&self) -> Result<Option<JobDisposition>, StorageError> {
        match self.queue.poll(self.poll_timeout).await? {
            Some(delivery) => Ok(Some(self.handle(delivery).await)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, delivery), fields(job_id = %delivery.job.job_id, capture_id = %delivery.job.capture_id, attempt = delivery.job.attempt))]
    pub async fn handle(&self, delivery: JobDelivery) -> JobDisposition {
        let processed = AssertUnwindSafe(self.coordinator.process(&delivery.job.capture_id))
            .catch_unwind()
            .await;
        let disposition = match processed {
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(panic = %message, "Worker job panicked");
                JobDisposition::DeadLettered {
                    reason: format!("panicked: {}", message),
                }
            }
            Ok(Ok(RunOutcome::Completed { .. })) => JobDisposition::Completed,
            Ok(Ok(RunOutcome::AlreadyCompleted)) => JobDisposition::AlreadyCompleted,
            Ok(Err(e)) => {
                let attempts_made = delivery.job.attempt + 1;
                if e.is_retryable() && self.retry.should_retry(attempts_made) {
                    let delay = self.retry.delay_for(attempts_made);
                    let next = delivery.job.next_attempt(e.to_string());
                    match self.queue.enqueue_delayed(&next, delay).await {
                        Ok(()) => {
                            tracing::warn!(error = %e, ?delay, "Job failed, retry scheduled");
                            JobDisposition::Retried {
                                attempt: next.attempt,
                                delay,
                            }
                        }
                        Err(enqueue_err) => {
                            tracing::error!(error = %enqueue_err, "Could not schedule retry");
                            JobDisposition::DeadLettered {
                                reason: format!("{}; retry enqueue failed: {}", e, enqueue_err),
                            }
                        }
                    }
                } else {
                    tracing::error!(error = %e, attempts_made, "Job failed permanently");
                    JobDisposition::DeadLettered {
                        reason: e.to_string(),
                    }
                }
            }
        };

        let settled = match &disposition {
            JobDisposition::DeadLettered { reason } => {
                self.queue.dead_letter(&delivery, reason).await
            }
            _ => self.queue.ack(&delivery).await,
        };
        if let Err(e) = settled {
            tracing::error!(error = %e, "Could not settle delivery");
        }

        self.telemetry.record_job(match disposition {
            JobDisposition::Completed => "completed",
            JobDisposition::AlreadyCompleted => "skipped",
            JobDisposition::Retried { .. } => "retried",
            JobDisposition::DeadLettered { .. } => "dead_lettered",
        });
        disposition
    }
}
