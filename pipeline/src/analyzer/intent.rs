//! Intent classification with a fixed enum contract.

use super::truncate_chars;
use errors::{CollaboratorError, DecodeError};
use serde::Deserialize;
use stash_core::StructuredOutput;
use stash_core::traits::{LlmClient, complete_structured};
use stash_core::types::{
    Capture, ChatMessage, ChatRequest, DeepAnalysis, PrimaryIntent, Urgency, UserIntent,
    ordered_set,
};

const INTENT_SYSTEM_PROMPT: &str = "Classify why the user saved this content. Reply with a \
single JSON object: {\"primary\": one of save_for_later, learn, research, reference, share, \
action_required; \"urgency\": one of low, medium, high; \"category\": short string; \
\"suggestedActions\": array of strings; \"confidence\": number between 0 and 1}.";

const SUMMARY_CHARS: usize = 600;
const CONTEXT_CHARS: usize = 1_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IntentResponse {
    primary: String,
    #[serde(default)]
    urgency: String,
    #[serde(default)]
    category: String,
    #[serde(default, alias = "suggested_actions")]
    suggested_actions: Vec<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase().replace([' ', '-'], "_")
}

impl StructuredOutput for IntentResponse {
    fn validate(&self) -> Result<(), DecodeError> {
        if normalize(&self.primary).parse::<PrimaryIntent>().is_err() {
            return Err(DecodeError::SchemaViolation {
                field: "primary".to_string(),
                reason: format!("unknown intent {:?}", self.primary),
            });
        }
        if !self.urgency.trim().is_empty() && normalize(&self.urgency).parse::<Urgency>().is_err() {
            return Err(DecodeError::SchemaViolation {
                field: "urgency".to_string(),
                reason: format!("unknown urgency {:?}", self.urgency),
            });
        }
        if let Some(confidence) = self.confidence
            && !confidence.is_finite()
        {
            return Err(DecodeError::SchemaViolation {
                field: "confidence".to_string(),
                reason: "not a finite number".to_string(),
            });
        }
        Ok(())
    }
}

impl IntentResponse {
    fn into_intent(self) -> UserIntent {
        let category = match self.category.trim() {
            "" => "general".to_string(),
            category => category.to_lowercase(),
        };
        UserIntent {
            primary: normalize(&self.primary).parse().unwrap_or_default(),
            urgency: normalize(&self.urgency).parse().unwrap_or_default(),
            category,
            suggested_actions: ordered_set(self.suggested_actions),
            confidence: self.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
        }
    }
}

fn request(capture: &Capture, analysis: &DeepAnalysis, context: &str) -> ChatRequest {
    let mut body = format!(
        "Type: {}\nTitle: {}\nDescription: {}\nTopics: {}",
        analysis.content_type,
        analysis.title,
        truncate_chars(&analysis.description, SUMMARY_CHARS),
        analysis.topics.join(", "),
    );
    if !analysis.action_items.is_empty() {
        body.push_str(&format!("\nAction items: {}", analysis.action_items.join("; ")));
    }
    if !analysis.dates.is_empty() {
        body.push_str(&format!("\nDates: {}", analysis.dates.join(", ")));
    }
    if let Some(note) = capture.annotation.as_deref() {
        body.push_str(&format!("\nUser note: {}", note));
    }
    if !context.is_empty() {
        body.push_str(&format!(
            "\n\nPreviously saved:\n{}",
            truncate_chars(context, CONTEXT_CHARS)
        ));
    }

    ChatRequest::new(vec![
        ChatMessage::system(INTENT_SYSTEM_PROMPT),
        ChatMessage::user(format!("Classify intent:\n{}", body)),
    ])
    .with_temperature(0.0)
}

pub async fn classify(
    llm: &dyn LlmClient,
    capture: &Capture,
    analysis: &DeepAnalysis,
    context: &str,
) -> Result<UserIntent, CollaboratorError> {
    let response = complete_structured::<IntentResponse>(
        llm,
        &request(capture, analysis, context),
        &capture.owner_id,
    )
    .await?;
    Ok(response.into_intent())
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapters::mock::MockLlm;
    use stash_core::types::{CaptureType, OwnerId};

    fn capture() -> Capture {
        Capture::new(
            OwnerId::new("u1".to_string()).unwrap(),
            CaptureType::Text,
            "Read the tokio tutorial",
        )
    }

    #[tokio::test]
    async fn test_valid_reply_is_mapped() {
        let llm = MockLlm::new();
        llm.set_default_response(
            r#"{"primary": "Action Required", "urgency": "HIGH", "category": "Errands",
                "suggestedActions": ["create_reminder"], "confidence": 1.7}"#,
        )
        .await;

        let intent = classify(&llm, &capture(), &DeepAnalysis::default(), "")
            .await
            .unwrap();
        assert_eq!(intent.primary, PrimaryIntent::ActionRequired);
        assert_eq!(intent.urgency, Urgency::High);
        assert_eq!(intent.category, "errands");
        assert_eq!(intent.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_unknown_enum_is_decode_error() {
        let llm = MockLlm::new();
        llm.set_default_response(r#"{"primary": "procrastinate", "urgency": "low"}"#)
            .await;

        let err = classify(&llm, &capture(), &DeepAnalysis::default(), "")
            .await
            .unwrap_err();
        assert!(err.is_decode());
    }

    #[tokio::test]
    async fn test_context_is_included_in_prompt() {
        let llm = MockLlm::new();
        llm.set_default_response(r#"{"primary": "learn"}"#).await;

        let intent = classify(
            &llm,
            &capture(),
            &DeepAnalysis::default(),
            "- Tokio internals",
        )
        .await
        .unwrap();
        assert_eq!(intent.urgency, Urgency::Low);
        assert_eq!(intent.category, "general");

        let requests = llm.requests().await;
        assert!(requests[0].transcript().contains("Tokio internals"));
        assert!(requests[0].json_mode);
    }
}
