//! Scripted collaborator implementations for tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use errors::CollaboratorError;
use stash_core::traits::{
    CalendarClient, ContentExtractor, FrameSampler, LlmClient, Notifier, ReminderScheduler,
    SemanticMemory, Summarizer, VisionClient,
};
use stash_core::types::{
    CalendarEvent, CalendarEventRequest, ChatRequest, ContentSnippet, ExtractionKind,
    Notification, OwnerId, VisionImage,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

fn unavailable(service: &str) -> CollaboratorError {
    CollaboratorError::Transport {
        service: service.to_string(),
        reason: "mock configured to fail".to_string(),
    }
}

/// LLM whose replies are routed by substring of the request transcript.
///
/// Failures are checked first, then responses in registration order, then
/// the `DEFAULT` response.
pub struct MockLlm {
    responses: Arc<RwLock<Vec<(String, String)>>>,
    failures: Arc<RwLock<Vec<(String, CollaboratorError)>>>,
    requests: Arc<RwLock<Vec<ChatRequest>>>,
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(RwLock::new(Vec::new())),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn add_response(&self, pattern: &str, response: &str) {
        let mut responses = self.responses.write().await;
        responses.push((pattern.to_string(), response.to_string()));
    }

    pub async fn set_default_response(&self, response: &str) {
        self.add_response("DEFAULT", response).await;
    }

    pub async fn fail_on(&self, pattern: &str, error: CollaboratorError) {
        let mut failures = self.failures.write().await;
        failures.push((pattern.to_string(), error));
    }

    /// Every request fails with a transport error.
    pub async fn fail_all(&self) {
        self.fail_on("", unavailable("llm")).await;
    }

    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn complete(
        &self,
        request: &ChatRequest,
        _owner_id: &OwnerId,
    ) -> Result<String, CollaboratorError> {
        self.requests.write().await.push(request.clone());
        let transcript = request.transcript();

        let failures = self.failures.read().await;
        if let Some((_, error)) = failures.iter().find(|(p, _)| transcript.contains(p.as_str())) {
            return Err(error.clone());
        }

        let responses = self.responses.read().await;
        if let Some((_, response)) = responses
            .iter()
            .find(|(p, _)| p != "DEFAULT" && transcript.contains(p.as_str()))
        {
            Ok(response.clone())
        } else if let Some((_, response)) = responses.iter().find(|(p, _)| p == "DEFAULT") {
            Ok(response.clone())
        } else {
            let preview: String = transcript.chars().take(50).collect();
            Ok(format!("Mock response for: {}", preview))
        }
    }
}

/// Extractor with per-URL scripted results. Unknown URLs answer 404.
#[derive(Default)]
pub struct MockExtractor {
    results: RwLock<HashMap<String, Result<String, CollaboratorError>>>,
    calls: RwLock<Vec<(String, ExtractionKind)>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_text(&self, url: &str, text: &str) {
        self.results
            .write()
            .await
            .insert(url.to_string(), Ok(text.to_string()));
    }

    pub async fn with_error(&self, url: &str, error: CollaboratorError) {
        self.results.write().await.insert(url.to_string(), Err(error));
    }

    pub async fn calls(&self) -> Vec<(String, ExtractionKind)> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl ContentExtractor for MockExtractor {
    async fn extract(&self, url: &str, kind: ExtractionKind) -> Result<String, CollaboratorError> {
        self.calls.write().await.push((url.to_string(), kind));
        match self.results.read().await.get(url) {
            Some(result) => result.clone(),
            None => Err(CollaboratorError::Status {
                service: "content_extraction".to_string(),
                status: 404,
            }),
        }
    }
}

pub struct MockVision {
    response: RwLock<Result<String, CollaboratorError>>,
    calls: RwLock<Vec<(usize, String)>>,
}

impl MockVision {
    pub fn new(response: &str) -> Self {
        Self {
            response: RwLock::new(Ok(response.to_string())),
            calls: RwLock::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: RwLock::new(Err(unavailable("vision"))),
            calls: RwLock::new(Vec::new()),
        }
    }

    pub async fn set_response(&self, response: &str) {
        *self.response.write().await = Ok(response.to_string());
    }

    /// `(image count, prompt)` per call.
    pub async fn calls(&self) -> Vec<(usize, String)> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl VisionClient for MockVision {
    async fn describe(
        &self,
        images: &[VisionImage],
        prompt: &str,
    ) -> Result<String, CollaboratorError> {
        self.calls
            .write()
            .await
            .push((images.len(), prompt.to_string()));
        self.response.read().await.clone()
    }
}

/// Frame sampler answering `count` synthetic frame URLs.
#[derive(Default)]
pub struct MockFrameSampler {
    fail: bool,
}

impl MockFrameSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl FrameSampler for MockFrameSampler {
    async fn sample_frames(
        &self,
        video_ref: &str,
        count: usize,
    ) -> Result<Vec<VisionImage>, CollaboratorError> {
        if self.fail {
            return Err(unavailable("frame_sampler"));
        }
        Ok((0..count)
            .map(|i| VisionImage::Url {
                url: format!("{}#frame-{}", video_ref, i),
            })
            .collect())
    }
}

#[derive(Default)]
pub struct MockSemanticMemory {
    snippets: Vec<ContentSnippet>,
    fail: bool,
}

impl MockSemanticMemory {
    pub fn new(snippets: Vec<ContentSnippet>) -> Self {
        Self {
            snippets,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            snippets: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl SemanticMemory for MockSemanticMemory {
    async fn search(
        &self,
        _query: &str,
        _owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ContentSnippet>, CollaboratorError> {
        if self.fail {
            return Err(unavailable("semantic_memory"));
        }
        Ok(self.snippets.iter().take(limit).cloned().collect())
    }
}

#[derive(Default)]
pub struct MockCalendar {
    fail: bool,
    created: RwLock<Vec<(OwnerId, CalendarEventRequest)>>,
    next_id: AtomicUsize,
}

impl MockCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn created(&self) -> Vec<(OwnerId, CalendarEventRequest)> {
        self.created.read().await.clone()
    }
}

#[async_trait]
impl CalendarClient for MockCalendar {
    async fn create_event(
        &self,
        owner_id: &OwnerId,
        event: &CalendarEventRequest,
    ) -> Result<CalendarEvent, CollaboratorError> {
        if self.fail {
            return Err(unavailable("calendar"));
        }
        self.created
            .write()
            .await
            .push((owner_id.clone(), event.clone()));
        let id = format!("evt-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        Ok(CalendarEvent {
            link: Some(format!("https://calendar.example/{}", id)),
            id,
        })
    }

    async fn update_event(
        &self,
        _owner_id: &OwnerId,
        event_id: &str,
        _event: &CalendarEventRequest,
    ) -> Result<CalendarEvent, CollaboratorError> {
        if self.fail {
            return Err(unavailable("calendar"));
        }
        Ok(CalendarEvent {
            id: event_id.to_string(),
            link: None,
        })
    }

    async fn delete_event(
        &self,
        _owner_id: &OwnerId,
        _event_id: &str,
    ) -> Result<(), CollaboratorError> {
        if self.fail {
            return Err(unavailable("calendar"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MockNotifier {
    fail: bool,
    sent: RwLock<Vec<Notification>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, notification: &Notification) -> Result<bool, CollaboratorError> {
        if self.fail {
            return Err(unavailable("notifier"));
        }
        self.sent.write().await.push(notification.clone());
        Ok(true)
    }
}

#[derive(Default)]
pub struct MockScheduler {
    fail: bool,
    scheduled: RwLock<Vec<(String, DateTime<Utc>)>>,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn scheduled(&self) -> Vec<(String, DateTime<Utc>)> {
        self.scheduled.read().await.clone()
    }
}

#[async_trait]
impl ReminderScheduler for MockScheduler {
    async fn schedule(
        &self,
        reminder_id: &str,
        remind_at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError> {
        if self.fail {
            return Err(unavailable("reminder_scheduler"));
        }
        self.scheduled
            .write()
            .await
            .push((reminder_id.to_string(), remind_at));
        Ok(())
    }
}

/// Summarizer returning a bounded prefix of the content.
#[derive(Default)]
pub struct MockSummarizer {
    fail: bool,
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(
        &self,
        content: &str,
        max_length: usize,
        _owner_id: &OwnerId,
    ) -> Result<String, CollaboratorError> {
        if self.fail {
            return Err(unavailable("summarizer"));
        }
        Ok(content.chars().take(max_length).collect())
    }
}
