use super::estimate_minutes;
use errors::CollaboratorError;
use serde::Deserialize;
use stash_core::traits::{LlmClient, complete_structured};
use stash_core::types::{
    ChatMessage, ChatRequest, DeepAnalysis, DifficultyLevel, EntityBuckets, OwnerId,
    ordered_set,
};
use stash_core::StructuredOutput;

const EXTRACTION_SYSTEM_PROMPT: &str = "You analyze saved content for a personal knowledge \
assistant. Reply with a single JSON object with these keys: \"title\" (string), \
\"description\" (one or two sentences), \"topics\" (array of short lowercase strings), \
\"entities\" (object with arrays \"people\", \"organizations\", \"technologies\", \
\"locations\"), \"keyTakeaways\" (array), \"actionItems\" (array), \"dates\" (array of \
dates or times mentioned), \"difficulty\" (beginner, intermediate, advanced or unknown). \
Do not add any prose outside the object.";

/// Structured reply shared by the LLM and vision branches. Every field is
/// optional so a partial object still decodes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct AnalysisResponse {
    pub title: String,
    pub description: String,
    pub topics: Vec<String>,
    pub entities: EntityBuckets,
    #[serde(alias = "key_takeaways")]
    pub key_takeaways: Vec<String>,
    #[serde(alias = "action_items")]
    pub action_items: Vec<String>,
    pub dates: Vec<String>,
    pub difficulty: String,
}

impl StructuredOutput for AnalysisResponse {}

impl AnalysisResponse {
    /// Canonical analysis for `content`. A blank title falls back to
    /// `fallback_title`.
    pub fn into_analysis(
        self,
        content: String,
        content_type: &str,
        fallback_title: String,
        words_per_minute: u32,
    ) -> DeepAnalysis {
        let title = match self.title.trim() {
            "" => fallback_title,
            title => title.to_string(),
        };
        let estimated_minutes = estimate_minutes(&content, words_per_minute);
        DeepAnalysis {
            title,
            description: self.description.trim().to_string(),
            content,
            content_type: content_type.to_string(),
            topics: Vec::new(),
            entities: EntityBuckets {
                people: ordered_set(self.entities.people),
                organizations: ordered_set(self.entities.organizations),
                technologies: ordered_set(self.entities.technologies),
                locations: ordered_set(self.entities.locations),
            },
            key_takeaways: ordered_set(self.key_takeaways),
            action_items: ordered_set(self.action_items),
            dates: ordered_set(self.dates),
            difficulty: DifficultyLevel::parse_lenient(&self.difficulty),
            estimated_minutes,
        }
        .with_topics(self.topics)
    }
}

/// The JSON contract described to the vision model.
pub(crate) fn vision_prompt(subject: &str) -> String {
    format!("{} {}", subject, EXTRACTION_SYSTEM_PROMPT)
}

/// One structured extraction call over `body`.
pub(crate) async fn extract(
    llm: &dyn LlmClient,
    owner_id: &OwnerId,
    kind: &str,
    body: &str,
) -> Result<AnalysisResponse, CollaboratorError> {
    let request = ChatRequest::new(vec![
        ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
        ChatMessage::user(format!("Analyze this {}:\n\n{}", kind, body)),
    ])
    .with_temperature(0.2);
    complete_structured::<AnalysisResponse>(llm, &request, owner_id).await
}
