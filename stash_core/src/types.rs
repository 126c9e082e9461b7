use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

/// Identifier of a capture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct CaptureId(String);

impl CaptureId {
    pub fn new(id: String) -> Option<Self> {
        if id.is_empty() || id.len() > 100 {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CaptureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CaptureId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string()).ok_or_else(|| anyhow::anyhow!("Invalid capture ID"))
    }
}

/// Identifier of the user owning a capture.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: String) -> Option<Self> {
        if id.is_empty() || id.len() > 100 {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for OwnerId {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string()).ok_or_else(|| anyhow::anyhow!("Invalid owner ID"))
    }
}

/// Kind of content a capture holds. Closed set; the analyzer matches on it
/// exhaustively.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CaptureType {
    Link,
    Text,
    Image,
    Video,
    Audio,
    Document,
    Other,
}

/// Processing lifecycle of a capture.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }

    /// Allowed transitions.
    ///
    /// `Processing -> Processing` covers a redelivered job whose previous
    /// worker died mid-run. `Failed -> Processing` is the queue retry path.
    /// `Completed` never reopens.
    pub fn can_transition_to(self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        match (self, next) {
            (Pending, Processing) => true,
            (Processing, Processing | Completed | Failed) => true,
            (Failed, Processing) => true,
            _ => false,
        }
    }
}

/// A single unit of user-submitted content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capture {
    pub id: CaptureId,
    pub owner_id: OwnerId,
    pub capture_type: CaptureType,
    /// URL, text body, or storage reference depending on `capture_type`.
    pub content: String,
    pub annotation: Option<String>,
    pub processing_status: ProcessingStatus,
    pub analysis: Option<DeepAnalysis>,
    pub action_plan: Option<ActionPlan>,
    pub action_results: Option<Vec<ExecutionResult>>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Capture {
    pub fn new(owner_id: OwnerId, capture_type: CaptureType, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: CaptureId::generate(),
            owner_id,
            capture_type,
            content: content.into(),
            annotation: None,
            processing_status: ProcessingStatus::Pending,
            analysis: None,
            action_plan: None,
            action_results: None,
            metadata: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
            processed_at: None,
        }
    }

    pub fn with_id(mut self, id: CaptureId) -> Self {
        self.id = id;
        self
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.updated_at = at;
        self
    }
}

/// Named entity buckets extracted from content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityBuckets {
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
}

impl EntityBuckets {
    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
            && self.organizations.is_empty()
            && self.technologies.is_empty()
            && self.locations.is_empty()
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Advanced,
    #[default]
    Unknown,
}

impl DifficultyLevel {
    /// Unrecognised labels map to `Unknown` instead of failing.
    pub fn parse_lenient(value: &str) -> Self {
        value.trim().parse().unwrap_or_default()
    }
}

/// Canonical analysis record every analyzer branch converges on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepAnalysis {
    pub title: String,
    pub description: String,
    pub content: String,
    pub content_type: String,
    /// Ordered set: first occurrence wins, compared case-insensitively.
    pub topics: Vec<String>,
    pub entities: EntityBuckets,
    pub key_takeaways: Vec<String>,
    pub action_items: Vec<String>,
    pub dates: Vec<String>,
    pub difficulty: DifficultyLevel,
    pub estimated_minutes: u32,
}

impl DeepAnalysis {
    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = ordered_set(topics);
        self
    }

    pub fn first_topic(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }
}

/// Deduplicates case-insensitively, keeping the first spelling and order.
/// Blank entries are dropped.
pub fn ordered_set<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for value in values {
        let value: String = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_lowercase()) {
            out.push(trimmed.to_string());
        }
    }
    out
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PrimaryIntent {
    #[default]
    SaveForLater,
    Learn,
    Research,
    Reference,
    Share,
    ActionRequired,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Urgency {
    #[default]
    Low,
    Medium,
    High,
}

/// What the user most likely wants done with a capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIntent {
    pub primary: PrimaryIntent,
    pub urgency: Urgency,
    pub category: String,
    pub suggested_actions: Vec<String>,
    pub confidence: f32,
}

impl UserIntent {
    /// Low-confidence default used when classification is unavailable.
    pub fn generic() -> Self {
        Self {
            primary: PrimaryIntent::SaveForLater,
            urgency: Urgency::Low,
            category: "general".to_string(),
            suggested_actions: Vec::new(),
            confidence: 0.3,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionType {
    AddToCollection,
    CreateReminder,
    AddTag,
    CreateCalendarEvent,
    Notify,
    Summarize,
    ExtractEntities,
}

/// One autonomous side effect proposed by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub data: serde_json::Value,
    pub priority: i32,
}

impl Action {
    pub fn new(action_type: ActionType, data: serde_json::Value, priority: i32) -> Self {
        Self {
            action_type,
            data,
            priority,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlan {
    pub capture_id: CaptureId,
    pub actions: Vec<Action>,
    pub confidence: f32,
    pub reasoning: String,
}

/// Outcome of one executed action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub action_type: ActionType,
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn succeeded(action_type: ActionType, data: Option<serde_json::Value>) -> Self {
        Self {
            action_type,
            success: true,
            data,
            error: None,
        }
    }

    pub fn failed(action_type: ActionType, error: impl Into<String>) -> Self {
        Self {
            action_type,
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PatternType {
    SaveTime,
    ContentPreference,
    NotificationTiming,
}

/// Confidence-scored behavioral summary, keyed by (owner, pattern type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPattern {
    pub owner_id: OwnerId,
    pub pattern_type: PatternType,
    pub data: serde_json::Value,
    pub confidence: f32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningStep {
    pub step: String,
    pub observation: String,
    pub result: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl ReasoningStep {
    pub fn new(
        step: impl Into<String>,
        observation: impl Into<String>,
        result: serde_json::Value,
    ) -> Self {
        Self {
            step: step.into(),
            observation: observation.into(),
            result,
            recorded_at: Utc::now(),
        }
    }
}

/// A previously completed capture sharing a topic with the current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedCapture {
    pub capture_id: CaptureId,
    pub title: String,
    pub topics: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerOutput {
    pub reasoning: Vec<ReasoningStep>,
    pub analysis: DeepAnalysis,
    pub context: String,
    pub intent: UserIntent,
    pub related: Vec<RelatedCapture>,
    pub related_count: usize,
}

/// Everything written on a successful run, in one idempotent write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureCompletion {
    pub analysis: DeepAnalysis,
    pub plan: ActionPlan,
    pub results: Vec<ExecutionResult>,
    pub reasoning: Vec<ReasoningStep>,
}

impl CaptureCompletion {
    /// The summary produced by the last successful `summarize` action.
    pub fn summary(&self) -> Option<&str> {
        self.results
            .iter()
            .rev()
            .filter(|r| r.success && r.action_type == ActionType::Summarize)
            .find_map(|r| r.data.as_ref()?.get("summary")?.as_str())
    }

    /// Keys merged into the capture metadata by the completion write:
    /// `reasoning`, plus `summary` when the run produced one.
    pub fn metadata_patch(
        &self,
    ) -> Result<serde_json::Map<String, serde_json::Value>, serde_json::Error> {
        let mut patch = serde_json::Map::new();
        patch.insert("reasoning".to_string(), serde_json::to_value(&self.reasoning)?);
        if let Some(summary) = self.summary() {
            patch.insert(
                "summary".to_string(),
                serde_json::Value::String(summary.to_string()),
            );
        }
        Ok(patch)
    }
}

/// Persisted record of one run's plan and its results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub id: String,
    pub capture_id: CaptureId,
    pub owner_id: OwnerId,
    pub plan: ActionPlan,
    pub results: Vec<ExecutionResult>,
    pub success_rate: f32,
    pub recorded_at: DateTime<Utc>,
}

impl ActionOutcome {
    pub fn new(
        capture_id: CaptureId,
        owner_id: OwnerId,
        plan: ActionPlan,
        results: Vec<ExecutionResult>,
    ) -> Self {
        let success_rate = if results.is_empty() {
            1.0
        } else {
            results.iter().filter(|r| r.success).count() as f32 / results.len() as f32
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            capture_id,
            owner_id,
            plan,
            results,
            success_rate,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_recorded_at(mut self, at: DateTime<Utc>) -> Self {
        self.recorded_at = at;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub id: String,
    pub owner_id: OwnerId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub owner_id: OwnerId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub owner_id: OwnerId,
    pub capture_id: CaptureId,
    pub message: String,
    pub remind_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Reminder {
    /// Idempotency key for delivering this reminder: owner + capture +
    /// deadline. Stable across process restarts.
    pub fn delivery_key(&self) -> String {
        format!(
            "reminder:{}:{}:{}",
            self.owner_id,
            self.capture_id,
            self.remind_at.timestamp()
        )
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub owner_id: OwnerId,
    pub title: String,
    pub body: String,
    pub action_tag: Option<String>,
    pub data: Option<serde_json::Value>,
    pub priority: NotificationPriority,
}

/// A notification that was delivered, with its read time once known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    pub owner_id: OwnerId,
    pub title: String,
    pub body: String,
    pub action_tag: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// One ranked hit from semantic memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSnippet {
    pub content: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Chat completion request. `model: None` means the client's default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub json_mode: bool,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: 0.3,
            max_tokens: None,
            json_mode: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }

    /// Concatenated message text, used by mocks to route scripted replies.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Image handed to the vision model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VisionImage {
    Url { url: String },
    Inline { mime_type: String, data_base64: String },
}

impl VisionImage {
    /// The form accepted by OpenAI-compatible `image_url` content parts.
    pub fn as_image_url(&self) -> String {
        match self {
            VisionImage::Url { url } => url.clone(),
            VisionImage::Inline {
                mime_type,
                data_base64,
            } => format!("data:{};base64,{}", mime_type, data_base64),
        }
    }
}

/// How a link's text should be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExtractionKind {
    Reader,
    Document,
    Transcript,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use ProcessingStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Pending.can_transition_to(Completed));
        assert!(Completed.is_terminal());
        assert!(!Processing.is_terminal());
    }

    #[test]
    fn test_ordered_set_keeps_first_spelling() {
        let topics = ordered_set(vec!["Rust", "async", "rust", "  ", "Async", "tokio"]);
        assert_eq!(topics, vec!["Rust", "async", "tokio"]);
    }

    #[test]
    fn test_action_serializes_type_field() {
        let action = Action::new(
            ActionType::AddTag,
            serde_json::json!({"tags": ["rust"]}),
            3,
        );
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "add_tag");
        assert_eq!(json["priority"], 3);

        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_capture_type_parses_from_snake_case() {
        assert_eq!("link".parse::<CaptureType>().unwrap(), CaptureType::Link);
        assert_eq!(CaptureType::Document.to_string(), "document");
        assert!("podcast".parse::<CaptureType>().is_err());
    }

    #[test]
    fn test_difficulty_is_lenient() {
        assert_eq!(
            DifficultyLevel::parse_lenient("Advanced"),
            DifficultyLevel::Advanced
        );
        assert_eq!(
            DifficultyLevel::parse_lenient("expert-only"),
            DifficultyLevel::Unknown
        );
    }

    #[test]
    fn test_outcome_success_rate() {
        let capture_id = CaptureId::generate();
        let plan = ActionPlan {
            capture_id: capture_id.clone(),
            actions: vec![],
            confidence: 0.5,
            reasoning: String::new(),
        };
        let outcome = ActionOutcome::new(
            capture_id,
            OwnerId::new("u1".to_string()).unwrap(),
            plan,
            vec![
                ExecutionResult::succeeded(ActionType::AddTag, None),
                ExecutionResult::failed(ActionType::Notify, "down"),
            ],
        );
        assert!((outcome.success_rate - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_reminder_delivery_key_is_stable() {
        let at = DateTime::parse_from_rfc3339("2026-01-02T17:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let reminder = Reminder {
            id: "r1".to_string(),
            owner_id: OwnerId::new("u1".to_string()).unwrap(),
            capture_id: CaptureId::new("c1".to_string()).unwrap(),
            message: "buy milk".to_string(),
            remind_at: at,
            created_at: at,
            delivered_at: None,
        };
        assert_eq!(reminder.delivery_key(), format!("reminder:u1:c1:{}", at.timestamp()));
    }
}
