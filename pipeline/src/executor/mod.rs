//! # Executor
//!
//! Runs every action of a plan in priority order and reports one
//! [`ExecutionResult`] per action. A failing or timed-out handler only
//! fails its own result; the loop always runs to the end.

pub mod handlers;

use crate::telemetry::PipelineTelemetry;
use config::ExecutorConfig;
use errors::ActionError;
use handlers::HandlerContext;
use serde_json::Value;
use stash_core::traits::{CalendarClient, Notifier, PipelineStore, ReminderScheduler, Summarizer};
use stash_core::types::{Action, ActionPlan, ActionType, ExecutionResult, OwnerId};
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

/// Actions ordered by priority, highest first. The sort is stable, so
/// equal priorities keep plan order.
pub fn sorted_actions(actions: &[Action]) -> Vec<&Action> {
    let mut sorted: Vec<&Action> = actions.iter().collect();
    sorted.sort_by_key(|action| Reverse(action.priority));
    sorted
}

pub struct Executor {
    store: Arc<dyn PipelineStore>,
    calendar: Arc<dyn CalendarClient>,
    notifier: Arc<dyn Notifier>,
    scheduler: Arc<dyn ReminderScheduler>,
    summarizer: Arc<dyn Summarizer>,
    config: ExecutorConfig,
    telemetry: PipelineTelemetry,
}

impl Executor {
    pub fn new(
        store: Arc<dyn PipelineStore>,
        calendar: Arc<dyn CalendarClient>,
        notifier: Arc<dyn Notifier>,
        scheduler: Arc<dyn ReminderScheduler>,
        summarizer: Arc<dyn Summarizer>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            calendar,
            notifier,
            scheduler,
            summarizer,
            config,
            telemetry: PipelineTelemetry::new(),
        }
    }

    /// Runs `plan` without analysis output; content-based actions read the
    /// capture's raw content.
    pub async fn execute(&self, plan: &ActionPlan, owner_id: &OwnerId) -> Vec<ExecutionResult> {
        self.execute_with_content(plan, owner_id, "").await
    }

    /// Runs `plan` with the content extracted by this run's analysis.
    #[tracing::instrument(skip(self, plan, content), fields(capture_id = %plan.capture_id, owner_id = %owner_id, actions = plan.actions.len()))]
    pub async fn execute_with_content(
        &self,
        plan: &ActionPlan,
        owner_id: &OwnerId,
        content: &str,
    ) -> Vec<ExecutionResult> {
        let ctx = HandlerContext {
            capture_id: &plan.capture_id,
            content,
            owner_id,
            store: self.store.as_ref(),
            calendar: self.calendar.as_ref(),
            notifier: self.notifier.as_ref(),
            scheduler: self.scheduler.as_ref(),
            summarizer: self.summarizer.as_ref(),
            config: &self.config,
        };

        let mut results = Vec::with_capacity(plan.actions.len());
        for action in sorted_actions(&plan.actions) {
            let result = match self.run_action(&ctx, action).await {
                Ok(data) => ExecutionResult::succeeded(action.action_type, Some(data)),
                Err(e) => {
                    tracing::warn!(action = %action.action_type, error = %e, "Action failed");
                    ExecutionResult::failed(action.action_type, e.to_string())
                }
            };
            self.telemetry
                .record_action(&action.action_type.to_string(), result.success);
            results.push(result);
        }
        results
    }

    async fn run_action(&self, ctx: &HandlerContext<'_>, action: &Action) -> Result<Value, ActionError> {
        let timeout = Duration::from_millis(self.config.action_timeout_ms);
        let data = &action.data;
        let handler = async {
            match action.action_type {
                ActionType::AddToCollection => handlers::add_to_collection(ctx, data).await,
                ActionType::CreateReminder => handlers::create_reminder(ctx, data).await,
                ActionType::AddTag => handlers::add_tag(ctx, data).await,
                ActionType::CreateCalendarEvent => handlers::create_calendar_event(ctx, data).await,
                ActionType::Notify => handlers::notify(ctx, data).await,
                ActionType::Summarize => handlers::summarize(ctx, data).await,
                ActionType::ExtractEntities => handlers::extract_entities(ctx, data).await,
            }
        };

        tokio::time::timeout(timeout, handler)
            .await
            .map_err(|_| ActionError::Timeout {
                action: action.action_type.to_string(),
                timeout_ms: self.config.action_timeout_ms,
            })?
    }
}
