//! Supervised fire-and-forget tasks.
//!
//! In-process pipeline runs and pattern mining are detached from their
//! caller but tracked here, so shutdown can wait for them with a deadline.
//! A panicking task is logged and counted; it never takes the process
//! down.

use crate::telemetry::PipelineTelemetry;
use errors::DispatchError;
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Result of draining the supervisor at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub drained: bool,
    pub remaining: usize,
}

#[derive(Clone)]
pub struct TaskSupervisor {
    tracker: TaskTracker,
    shutdown: CancellationToken,
    telemetry: PipelineTelemetry,
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            telemetry: PipelineTelemetry::new(),
        }
    }

    /// Token cancelled when shutdown begins. Long-running loops select on it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    pub fn spawn<F>(&self, name: &'static str, task: F) -> Result<(), DispatchError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shutting_down() {
            return Err(DispatchError::ShuttingDown);
        }

        let telemetry = self.telemetry;
        self.tracker.spawn(async move {
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                let message = panic_message(panic.as_ref());
                tracing::error!(task = name, panic = %message, "Supervised task panicked");
                telemetry.record_task_panic(name);
            }
        });
        Ok(())
    }

    /// Stops accepting tasks and waits for tracked ones until `deadline`.
    /// Tasks still running afterwards are left to finish or be dropped
    /// with the runtime.
    pub async fn shutdown(&self, deadline: Duration) -> DrainReport {
        self.shutdown.cancel();
        self.tracker.close();

        let drained = tokio::time::timeout(deadline, self.tracker.wait())
            .await
            .is_ok();
        let remaining = self.tracker.len();
        if drained {
            tracing::info!("All supervised tasks drained");
        } else {
            tracing::warn!(remaining, "Shutdown deadline reached with tasks still running");
        }
        DrainReport { drained, remaining }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_drains_tracked_tasks() {
        let supervisor = TaskSupervisor::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = done.clone();
            supervisor
                .spawn("test", async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        let report = supervisor.shutdown(Duration::from_secs(2)).await;
        assert!(report.drained);
        assert_eq!(report.remaining, 0);
        assert_eq!(done.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let supervisor = TaskSupervisor::new();
        supervisor
            .spawn("boom", async {
                panic!("handler exploded");
            })
            .unwrap();

        let report = supervisor.shutdown(Duration::from_secs(2)).await;
        assert!(report.drained);
    }

    #[tokio::test]
    async fn test_deadline_reports_remaining() {
        let supervisor = TaskSupervisor::new();
        supervisor
            .spawn("slow", async {
                tokio::time::sleep(Duration::from_secs(30)).await;
            })
            .unwrap();

        let report = supervisor.shutdown(Duration::from_millis(50)).await;
        assert!(!report.drained);
        assert_eq!(report.remaining, 1);
    }

    #[tokio::test]
    async fn test_spawn_rejected_after_shutdown() {
        let supervisor = TaskSupervisor::new();
        supervisor.shutdown(Duration::from_millis(10)).await;

        let result = supervisor.spawn("late", async {});
        assert_eq!(result, Err(DispatchError::ShuttingDown));
    }
}
