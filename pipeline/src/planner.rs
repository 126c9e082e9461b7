//! # Planner
//!
//! Turns an [`AnalyzerOutput`] into an ordered [`ActionPlan`] with a single
//! structured LLM call. The owner's mined patterns are part of the prompt.
//! When the call fails or its output does not decode, the planner falls
//! back to one low-priority `add_tag` action whose confidence sits below
//! the acceptance threshold.

use crate::analyzer::truncate_chars;
use crate::telemetry::PipelineTelemetry;
use config::PlannerConfig;
use errors::DecodeError;
use serde::Deserialize;
use serde_json::json;
use stash_core::StructuredOutput;
use stash_core::traits::{LlmClient, PipelineStore, complete_structured};
use stash_core::types::{
    Action, ActionPlan, ActionType, AnalyzerOutput, CaptureId, ChatMessage, ChatRequest,
    OwnerId, UserPattern,
};
use std::cmp::Reverse;
use std::sync::Arc;

const PLANNER_SYSTEM_PROMPT: &str = "You organize saved content for the user without asking \
them. Choose the actions worth taking and reply with a single JSON object: {\"actions\": \
[{\"type\": action type, \"data\": object, \"priority\": integer, higher runs first}], \
\"confidence\": number between 0 and 1, \"reasoning\": short string}. Action types and their \
data: add_to_collection {\"collection\": name}; create_reminder {\"message\": text, \
\"remindAt\": RFC 3339 timestamp}; add_tag {\"tags\": [names]}; create_calendar_event \
{\"title\", \"start\", \"end\", \"location\"}; notify {\"title\", \"body\"}; summarize \
{\"maxLength\": integer}; extract_entities {}. Return an empty actions array when nothing \
is worth doing.";

const CONTEXT_CHARS: usize = 800;

#[derive(Debug, Clone, Deserialize)]
struct PlannedAction {
    #[serde(rename = "type", alias = "action")]
    action_type: String,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    priority: i32,
}

#[derive(Debug, Clone, Deserialize)]
struct PlanResponse {
    #[serde(default)]
    actions: Vec<PlannedAction>,
    confidence: f32,
    #[serde(default)]
    reasoning: String,
}

impl StructuredOutput for PlanResponse {
    fn validate(&self) -> Result<(), DecodeError> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(DecodeError::SchemaViolation {
                field: "confidence".to_string(),
                reason: format!("{} outside [0, 1]", self.confidence),
            });
        }
        for action in &self.actions {
            if action.action_type.trim().parse::<ActionType>().is_err() {
                return Err(DecodeError::SchemaViolation {
                    field: "actions.type".to_string(),
                    reason: format!("unknown action type {:?}", action.action_type),
                });
            }
        }
        Ok(())
    }
}

pub struct Planner {
    llm: Arc<dyn LlmClient>,
    store: Arc<dyn PipelineStore>,
    config: PlannerConfig,
    telemetry: PipelineTelemetry,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, store: Arc<dyn PipelineStore>, config: PlannerConfig) -> Self {
        Self {
            llm,
            store,
            config,
            telemetry: PipelineTelemetry::new(),
        }
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.config.confidence_threshold
    }

    /// Plans scoring below the threshold are flagged, never rejected.
    pub fn is_low_confidence(&self, plan: &ActionPlan) -> bool {
        plan.confidence < self.config.confidence_threshold
    }

    #[tracing::instrument(skip(self, output), fields(capture_id = %capture_id, owner_id = %owner_id))]
    pub async fn create_plan(
        &self,
        output: &AnalyzerOutput,
        capture_id: &CaptureId,
        owner_id: &OwnerId,
    ) -> ActionPlan {
        let patterns = match self.store.list_patterns(owner_id).await {
            Ok(patterns) => patterns,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load user patterns for planning");
                self.telemetry.record_degraded("patterns");
                Vec::new()
            }
        };

        let request = plan_request(output, &patterns);
        match complete_structured::<PlanResponse>(self.llm.as_ref(), &request, owner_id).await {
            Ok(response) => self.accept(response, capture_id),
            Err(e) => {
                tracing::warn!(error = %e, "Planning failed, using fallback plan");
                self.telemetry.record_degraded("planner");
                self.fallback_plan(output, capture_id, &e.to_string())
            }
        }
    }

    fn accept(&self, response: PlanResponse, capture_id: &CaptureId) -> ActionPlan {
        let total = response.actions.len();
        let mut actions: Vec<Action> = response
            .actions
            .into_iter()
            .filter_map(|planned| {
                let action_type = planned.action_type.trim().parse().ok()?;
                Some(Action::new(action_type, planned.data, planned.priority))
            })
            .collect();
        // Rank before capping so the cap drops the lowest priorities.
        actions.sort_by_key(|action| Reverse(action.priority));
        actions.truncate(self.config.max_actions);
        if actions.len() < total {
            tracing::debug!(
                proposed = total,
                kept = actions.len(),
                "Plan truncated to max actions"
            );
        }

        ActionPlan {
            capture_id: capture_id.clone(),
            actions,
            confidence: response.confidence,
            reasoning: response.reasoning,
        }
    }

    /// One `add_tag` action with the extracted topics, or the content type
    /// when no topics were found.
    pub fn fallback_plan(
        &self,
        output: &AnalyzerOutput,
        capture_id: &CaptureId,
        reason: &str,
    ) -> ActionPlan {
        let tags = if output.analysis.topics.is_empty() {
            vec![output.analysis.content_type.clone()]
        } else {
            output.analysis.topics.clone()
        };
        ActionPlan {
            capture_id: capture_id.clone(),
            actions: vec![Action::new(
                ActionType::AddTag,
                json!({ "tags": tags }),
                self.config.fallback_priority,
            )],
            confidence: self.config.fallback_confidence,
            reasoning: format!("fallback plan: {}", reason),
        }
    }
}

fn describe_pattern(pattern: &UserPattern) -> String {
    format!(
        "{} (confidence {:.2}): {}",
        pattern.pattern_type, pattern.confidence, pattern.data
    )
}

fn plan_request(output: &AnalyzerOutput, patterns: &[UserPattern]) -> ChatRequest {
    let analysis = &output.analysis;
    let mut body = format!(
        "Title: {}\nType: {}\nDescription: {}\nTopics: {}\nIntent: {} (urgency {}, category {}, confidence {:.2})",
        analysis.title,
        analysis.content_type,
        analysis.description,
        analysis.topics.join(", "),
        output.intent.primary,
        output.intent.urgency,
        output.intent.category,
        output.intent.confidence,
    );
    if !output.intent.suggested_actions.is_empty() {
        body.push_str(&format!(
            "\nSuggested: {}",
            output.intent.suggested_actions.join(", ")
        ));
    }
    if !analysis.action_items.is_empty() {
        body.push_str(&format!("\nAction items: {}", analysis.action_items.join("; ")));
    }
    if !analysis.dates.is_empty() {
        body.push_str(&format!("\nDates: {}", analysis.dates.join(", ")));
    }
    body.push_str(&format!("\nRelated saved items: {}", output.related_count));
    for related in &output.related {
        body.push_str(&format!("\n- {}", related.title));
    }
    if !output.context.is_empty() {
        body.push_str(&format!(
            "\n\nContext:\n{}",
            truncate_chars(&output.context, CONTEXT_CHARS)
        ));
    }
    if !patterns.is_empty() {
        body.push_str("\n\nUser patterns:");
        for pattern in patterns {
            body.push_str(&format!("\n- {}", describe_pattern(pattern)));
        }
    }

    ChatRequest::new(vec![
        ChatMessage::system(PLANNER_SYSTEM_PROMPT),
        ChatMessage::user(format!("Plan actions for this capture:\n{}", body)),
    ])
    .with_temperature(0.2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapters::mock::MockLlm;
    use chrono::Utc;
    use stash_core::traits::PatternStore;
    use stash_core::types::{DeepAnalysis, PatternType, UserIntent};
    use storage::InMemoryStore;

    fn owner() -> OwnerId {
        OwnerId::new("u1".to_string()).unwrap()
    }

    fn output(topics: &[&str]) -> AnalyzerOutput {
        AnalyzerOutput {
            reasoning: vec![],
            analysis: DeepAnalysis {
                title: "Buy milk".to_string(),
                content_type: "text".to_string(),
                ..DeepAnalysis::default()
            }
            .with_topics(topics.iter().copied()),
            context: String::new(),
            intent: UserIntent::generic(),
            related: vec![],
            related_count: 0,
        }
    }

    fn planner(llm: Arc<MockLlm>, store: Arc<InMemoryStore>) -> Planner {
        Planner::new(llm, store, PlannerConfig::default())
    }

    #[tokio::test]
    async fn test_fallback_when_llm_unavailable() {
        let llm = Arc::new(MockLlm::new());
        llm.fail_all().await;
        let planner = planner(llm, Arc::new(InMemoryStore::new()));

        let capture_id = CaptureId::generate();
        let plan = planner
            .create_plan(&output(&["groceries", "errands"]), &capture_id, &owner())
            .await;
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.actions[0].action_type, ActionType::AddTag);
        assert_eq!(plan.actions[0].data["tags"], json!(["groceries", "errands"]));
        assert_eq!(plan.actions[0].priority, 1);
        assert!(planner.is_low_confidence(&plan));
        assert!(plan.confidence < config::DEFAULT_CONFIDENCE_THRESHOLD);
    }

    #[tokio::test]
    async fn test_fallback_without_topics_tags_content_type() {
        let llm = Arc::new(MockLlm::new());
        llm.set_default_response("no plan today").await;
        let planner = planner(llm, Arc::new(InMemoryStore::new()));

        let plan = planner
            .create_plan(&output(&[]), &CaptureId::generate(), &owner())
            .await;
        assert_eq!(plan.actions[0].data["tags"], json!(["text"]));
    }

    #[tokio::test]
    async fn test_unknown_action_type_falls_back() {
        let llm = Arc::new(MockLlm::new());
        llm.set_default_response(
            r#"{"actions": [{"type": "launch_rocket", "priority": 9}], "confidence": 0.9}"#,
        )
        .await;
        let planner = planner(llm, Arc::new(InMemoryStore::new()));

        let plan = planner
            .create_plan(&output(&["space"]), &CaptureId::generate(), &owner())
            .await;
        assert_eq!(plan.confidence, config::DEFAULT_FALLBACK_CONFIDENCE);
        assert!(plan.reasoning.starts_with("fallback plan"));
    }

    #[tokio::test]
    async fn test_decoded_plan_is_ranked_and_capped() {
        let llm = Arc::new(MockLlm::new());
        llm.set_default_response(
            r#"{"actions": [
                {"type": "add_tag", "data": {"tags": ["rust"]}, "priority": 2},
                {"type": "add_to_collection", "data": {"collection": "Reading"}, "priority": 5},
                {"type": "notify", "data": {"title": "t", "body": "b"}, "priority": 1}
            ], "confidence": 0.85, "reasoning": "learning material"}"#,
        )
        .await;
        let planner = Planner::new(
            llm,
            Arc::new(InMemoryStore::new()),
            PlannerConfig {
                max_actions: 2,
                ..PlannerConfig::default()
            },
        );

        let plan = planner
            .create_plan(&output(&["rust"]), &CaptureId::generate(), &owner())
            .await;
        let types: Vec<_> = plan.actions.iter().map(|a| a.action_type).collect();
        assert_eq!(types, vec![ActionType::AddToCollection, ActionType::AddTag]);
        assert_eq!(plan.confidence, 0.85);
        assert!(!planner.is_low_confidence(&plan));
    }

    #[tokio::test]
    async fn test_cap_keeps_high_priority_action_listed_last() {
        let mut actions: Vec<_> = (0..8)
            .map(|i| json!({"type": "add_tag", "data": {"tags": [format!("t{i}")]}, "priority": 1}))
            .collect();
        actions.push(json!({
            "type": "create_reminder",
            "data": {"message": "Pay rent"},
            "priority": 10
        }));
        let llm = Arc::new(MockLlm::new());
        llm.set_default_response(
            &json!({"actions": actions, "confidence": 0.9, "reasoning": "busy"}).to_string(),
        )
        .await;
        let planner = planner(llm, Arc::new(InMemoryStore::new()));

        let plan = planner
            .create_plan(&output(&["rent"]), &CaptureId::generate(), &owner())
            .await;
        assert_eq!(plan.actions.len(), PlannerConfig::default().max_actions);
        assert_eq!(plan.actions[0].action_type, ActionType::CreateReminder);
        assert_eq!(plan.actions[1].data["tags"], json!(["t0"]));
    }

    #[tokio::test]
    async fn test_patterns_are_in_prompt() {
        let llm = Arc::new(MockLlm::new());
        llm.set_default_response(r#"{"actions": [], "confidence": 0.8}"#)
            .await;
        let store = Arc::new(InMemoryStore::new());
        store
            .upsert_pattern(&UserPattern {
                owner_id: owner(),
                pattern_type: PatternType::SaveTime,
                data: json!({"peakHour": 21}),
                confidence: 0.7,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        let planner = planner(llm.clone(), store);

        let plan = planner
            .create_plan(&output(&["rust"]), &CaptureId::generate(), &owner())
            .await;
        assert!(plan.actions.is_empty());

        let transcript = llm.requests().await[0].transcript();
        assert!(transcript.contains("save_time"));
        assert!(transcript.contains("peakHour"));
    }
}
