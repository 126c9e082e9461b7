//! # Coordinator
//!
//! Owns the per-capture state machine
//! `Pending -> Processing -> {Completed, Failed}` and runs the four stages
//! in order: Analyze, Plan, Execute, Learn.
//!
//! Only stage-fatal errors move a capture to `Failed`; everything written
//! on success lands in one idempotent completion write, so nothing partial
//! survives a failed run. A successful run emits exactly one summary
//! notification.

use crate::analyzer::Analyzer;
use crate::executor::Executor;
use crate::learner::Learner;
use crate::planner::Planner;
use crate::supervisor::panic_message;
use crate::telemetry::PipelineTelemetry;
use errors::{PipelineError, Stage};
use futures_util::FutureExt;
use serde_json::json;
use stash_core::traits::{ExecutionGuard, Notifier, PipelineStore};
use stash_core::types::{
    ActionType, CaptureCompletion, CaptureId, ExecutionResult, Notification,
    NotificationPriority, ProcessingStatus,
};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SUMMARY_TITLE_CHARS: usize = 80;

/// Terminal result of one `process` call.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        actions: usize,
        succeeded: usize,
        confidence: f32,
        low_confidence: bool,
        summary: String,
    },
    /// The capture had already completed; nothing was done.
    AlreadyCompleted,
}

pub struct Coordinator {
    store: Arc<dyn PipelineStore>,
    guard: Arc<dyn ExecutionGuard>,
    notifier: Arc<dyn Notifier>,
    analyzer: Analyzer,
    planner: Planner,
    executor: Executor,
    learner: Learner,
    lock_ttl: Duration,
    telemetry: PipelineTelemetry,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        guard: Arc<dyn ExecutionGuard>,
        notifier: Arc<dyn Notifier>,
        analyzer: Analyzer,
        planner: Planner,
        executor: Executor,
        learner: Learner,
        lock_ttl: Duration,
    ) -> Self {
        Self {
            store,
            guard,
            notifier,
            analyzer,
            planner,
            executor,
            learner,
            lock_ttl,
            telemetry: PipelineTelemetry::new(),
        }
    }

    pub fn learner(&self) -> &Learner {
        &self.learner
    }

    /// Runs the pipeline for one capture under its execution guard.
    #[tracing::instrument(skip(self), fields(capture_id = %capture_id))]
    pub async fn process(&self, capture_id: &CaptureId) -> Result<RunOutcome, PipelineError> {
        let token = self
            .guard
            .acquire(capture_id, self.lock_ttl)
            .await
            .map_err(|e| PipelineError::storage(Stage::Load, e))?
            .ok_or_else(|| PipelineError::AlreadyRunning {
                capture_id: capture_id.to_string(),
            })?;

        let started = Instant::now();
        let result = match AssertUnwindSafe(self.run(capture_id)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(panic = %message, "Pipeline run panicked");
                if let Err(e) = self.store.fail_capture(capture_id, &message).await {
                    tracing::error!(error = %e, "Could not mark capture failed");
                }
                Err(PipelineError::Panicked {
                    capture_id: capture_id.to_string(),
                    message,
                })
            }
        };

        if let Err(e) = self.guard.release(&token).await {
            tracing::warn!(error = %e, "Failed to release execution guard");
        }

        let status = match &result {
            Ok(RunOutcome::Completed { .. }) => "completed",
            Ok(RunOutcome::AlreadyCompleted) => "skipped",
            Err(_) => "failed",
        };
        self.telemetry.record_run(status, started.elapsed());
        result
    }

    async fn run(&self, capture_id: &CaptureId) -> Result<RunOutcome, PipelineError> {
        let capture = self
            .store
            .get_capture(capture_id)
            .await
            .map_err(|e| PipelineError::storage(Stage::Load, e))?
            .ok_or_else(|| PipelineError::CaptureNotFound {
                capture_id: capture_id.to_string(),
            })?;

        if capture.processing_status == ProcessingStatus::Completed {
            tracing::info!("Capture already completed, nothing to do");
            return Ok(RunOutcome::AlreadyCompleted);
        }
        if !capture
            .processing_status
            .can_transition_to(ProcessingStatus::Processing)
        {
            return Err(PipelineError::InvalidTransition {
                capture_id: capture_id.to_string(),
                from: capture.processing_status.to_string(),
                to: ProcessingStatus::Processing.to_string(),
            });
        }
        self.store
            .set_status(capture_id, ProcessingStatus::Processing)
            .await
            .map_err(|e| PipelineError::storage(Stage::Load, e))?;

        match self.run_stages(&capture).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(stage = ?e.stage(), error = %e, "Pipeline run failed");
                if let Err(write_err) = self.store.fail_capture(capture_id, &e.to_string()).await {
                    tracing::error!(error = %write_err, "Could not mark capture failed");
                }
                Err(e)
            }
        }
    }

    async fn timed<T>(&self, stage: Stage, fut: impl Future<Output = T>) -> T {
        let started = Instant::now();
        let value = fut.await;
        self.telemetry.record_stage(&stage.to_string(), started.elapsed());
        value
    }

    async fn run_stages(
        &self,
        capture: &stash_core::types::Capture,
    ) -> Result<RunOutcome, PipelineError> {
        let owner_id = &capture.owner_id;

        let output = self
            .timed(Stage::Analyze, self.analyzer.analyze(capture))
            .await;

        let plan = self
            .timed(
                Stage::Plan,
                self.planner.create_plan(&output, &capture.id, owner_id),
            )
            .await;
        let low_confidence = self.planner.is_low_confidence(&plan);
        if low_confidence {
            tracing::warn!(
                confidence = plan.confidence,
                threshold = self.planner.confidence_threshold(),
                "Low-confidence plan"
            );
            self.telemetry.record_low_confidence_plan(plan.confidence);
        }

        let results = self
            .timed(
                Stage::Execute,
                self.executor
                    .execute_with_content(&plan, owner_id, &output.analysis.content),
            )
            .await;

        let recorded = self
            .timed(
                Stage::Learn,
                self.learner
                    .record_outcome(&capture.id, &plan, &results, owner_id),
            )
            .await;
        if let Err(e) = recorded {
            tracing::warn!(error = %e, "Outcome not recorded");
            self.telemetry.record_degraded("outcome_record");
        }

        let summary = compose_summary(&results, output.related_count);
        let mut reasoning = output.reasoning;
        reasoning.push(stash_core::types::ReasoningStep::new(
            "execute",
            summary.clone(),
            json!({
                "actions": plan.actions.len(),
                "succeeded": results.iter().filter(|r| r.success).count(),
                "lowConfidence": low_confidence,
            }),
        ));

        let completion = CaptureCompletion {
            analysis: output.analysis,
            plan,
            results,
            reasoning,
        };
        self.timed(
            Stage::Finalize,
            self.store.complete_capture(&capture.id, &completion),
        )
        .await
        .map_err(|e| PipelineError::storage(Stage::Finalize, e))?;

        self.notify_summary(capture, &completion, &summary).await;

        let succeeded = completion.results.iter().filter(|r| r.success).count();
        tracing::info!(
            actions = completion.results.len(),
            succeeded,
            confidence = completion.plan.confidence,
            "Capture processed"
        );
        Ok(RunOutcome::Completed {
            actions: completion.results.len(),
            succeeded,
            confidence: completion.plan.confidence,
            low_confidence,
            summary,
        })
    }

    async fn notify_summary(
        &self,
        capture: &stash_core::types::Capture,
        completion: &CaptureCompletion,
        summary: &str,
    ) {
        let title: String = completion
            .analysis
            .title
            .chars()
            .take(SUMMARY_TITLE_CHARS)
            .collect();
        let notification = Notification {
            owner_id: capture.owner_id.clone(),
            title: format!("Saved: {}", title),
            body: summary.to_string(),
            action_tag: Some("capture_processed".to_string()),
            data: Some(json!({ "captureId": capture.id })),
            priority: NotificationPriority::Low,
        };
        match self.notifier.send(&notification).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("Summary notification not accepted"),
            Err(e) => tracing::warn!(error = %e, "Summary notification failed"),
        }
    }
}

/// Short human summary of a run, e.g. "Added to Reading, reminder set,
/// found 2 related items".
pub fn compose_summary(results: &[ExecutionResult], related_count: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for result in results.iter().filter(|r| r.success) {
        let data = result.data.as_ref();
        let part = match result.action_type {
            ActionType::AddToCollection => data
                .and_then(|d| d["collection"].as_str())
                .map(|name| format!("added to {}", name)),
            ActionType::CreateReminder => Some("reminder set".to_string()),
            ActionType::AddTag => data.and_then(|d| d["tags"].as_array()).map(|tags| {
                let names: Vec<&str> = tags.iter().filter_map(|t| t.as_str()).collect();
                format!("tagged {}", names.join(", "))
            }),
            ActionType::CreateCalendarEvent => Some("event added to calendar".to_string()),
            ActionType::Summarize => Some("summary ready".to_string()),
            ActionType::Notify | ActionType::ExtractEntities => None,
        };
        if let Some(part) = part
            && !parts.contains(&part)
        {
            parts.push(part);
        }
    }
    if related_count > 0 {
        parts.push(format!(
            "found {} related item{}",
            related_count,
            if related_count == 1 { "" } else { "s" }
        ));
    }

    let joined = if parts.is_empty() {
        "saved".to_string()
    } else {
        parts.join(", ")
    };
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_lists_successful_effects() {
        let results = vec![
            ExecutionResult::succeeded(
                ActionType::AddToCollection,
                Some(json!({"collection": "Reading"})),
            ),
            ExecutionResult::succeeded(ActionType::CreateReminder, Some(json!({}))),
            ExecutionResult::failed(ActionType::CreateCalendarEvent, "down"),
        ];
        assert_eq!(
            compose_summary(&results, 2),
            "Added to Reading, reminder set, found 2 related items"
        );
    }

    #[test]
    fn test_summary_defaults() {
        assert_eq!(compose_summary(&[], 0), "Saved");
        assert_eq!(compose_summary(&[], 1), "Found 1 related item");
        let tagged = vec![ExecutionResult::succeeded(
            ActionType::AddTag,
            Some(json!({"tags": ["rust", "async"]})),
        )];
        assert_eq!(compose_summary(&tagged, 0), "Tagged rust, async");
    }
}
