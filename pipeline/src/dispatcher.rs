//! # Dispatcher
//!
//! Entry point for new captures. `submit` returns as soon as the capture is
//! handed off; failures during processing are never reported back to the
//! caller.

use crate::coordinator::Coordinator;
use crate::supervisor::TaskSupervisor;
use crate::telemetry::PipelineTelemetry;
use errors::DispatchError;
use stash_core::jobs::CaptureJob;
use stash_core::traits::JobQueue;
use stash_core::types::{CaptureId, OwnerId};
use std::sync::Arc;

/// How captures reach the coordinator.
#[derive(Clone)]
pub enum DispatchMode {
    /// Durable queue drained by the worker pool.
    QueueBacked(Arc<dyn JobQueue>),
    /// Supervised detached task per capture.
    InProcess,
}

impl DispatchMode {
    pub fn name(&self) -> &'static str {
        match self {
            DispatchMode::QueueBacked(_) => "queue",
            DispatchMode::InProcess => "in_process",
        }
    }
}

/// Acknowledgement returned by `submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub capture_id: CaptureId,
    pub mode: &'static str,
    pub job_id: Option<String>,
}

pub struct Dispatcher {
    mode: DispatchMode,
    coordinator: Arc<Coordinator>,
    supervisor: TaskSupervisor,
    telemetry: PipelineTelemetry,
}

impl Dispatcher {
    pub fn new(mode: DispatchMode, coordinator: Arc<Coordinator>, supervisor: TaskSupervisor) -> Self {
        Self {
            mode,
            coordinator,
            supervisor,
            telemetry: PipelineTelemetry::new(),
        }
    }

    pub fn mode(&self) -> &DispatchMode {
        &self.mode
    }

    #[tracing::instrument(skip(self), fields(capture_id = %capture_id, owner_id = %owner_id, mode = self.mode.name()))]
    pub async fn submit(
        &self,
        capture_id: CaptureId,
        owner_id: OwnerId,
    ) -> Result<Accepted, DispatchError> {
        if self.supervisor.is_shutting_down() {
            return Err(DispatchError::ShuttingDown);
        }

        let job_id = match &self.mode {
            DispatchMode::QueueBacked(queue) => {
                let job = CaptureJob::new(capture_id.clone(), owner_id);
                queue
                    .enqueue(&job)
                    .await
                    .map_err(|e| DispatchError::EnqueueFailed {
                        capture_id: capture_id.to_string(),
                        reason: e.to_string(),
                    })?;
                tracing::debug!(job_id = %job.job_id, "Capture enqueued");
                Some(job.job_id)
            }
            DispatchMode::InProcess => {
                let coordinator = self.coordinator.clone();
                let id = capture_id.clone();
                self.supervisor.spawn("pipeline_run", async move {
                    match coordinator.process(&id).await {
                        Ok(outcome) => tracing::debug!(capture_id = %id, ?outcome, "In-process run finished"),
                        Err(e) => tracing::warn!(capture_id = %id, error = %e, "In-process run failed"),
                    }
                })?;
                None
            }
        };

        self.telemetry.record_dispatch(self.mode.name());
        Ok(Accepted {
            capture_id,
            mode: self.mode.name(),
            job_id,
        })
    }
}
