//! Boundary traits for the capture pipeline.
//!
//! Collaborators return `CollaboratorError`, stores and queues return
//! `StorageError`. Every trait is object safe so the pipeline can hold
//! `Arc<dyn Trait>` and tests can swap in mocks.

use crate::decode::{StructuredOutput, decode_structured};
use crate::jobs::{CaptureJob, GuardToken, JobDelivery};
use crate::types::{
    ActionOutcome, CalendarEvent, CalendarEventRequest, Capture, CaptureCompletion, CaptureId,
    ChatRequest, Collection, ContentSnippet, ExtractionKind, Notification, NotificationRecord,
    OwnerId, PatternType, ProcessingStatus, RelatedCapture, Reminder, Tag, UserPattern,
    VisionImage,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use errors::{CollaboratorError, StorageError};
use std::time::Duration;

/// Chat completion provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        request: &ChatRequest,
        owner_id: &OwnerId,
    ) -> Result<String, CollaboratorError>;

    /// Completion parsed into an untyped JSON object.
    async fn complete_json(
        &self,
        request: &ChatRequest,
        owner_id: &OwnerId,
    ) -> Result<serde_json::Value, CollaboratorError> {
        let mut request = request.clone();
        request.json_mode = true;
        let raw = self.complete(&request, owner_id).await?;
        decode_structured::<serde_json::Value>(&raw).map_err(|source| CollaboratorError::Decode {
            service: "llm".to_string(),
            source,
        })
    }
}

/// Completion decoded into `T`. Decode failures come back as
/// `CollaboratorError::Decode` so callers can tell them apart from
/// transport failures.
pub async fn complete_structured<T: StructuredOutput>(
    llm: &dyn LlmClient,
    request: &ChatRequest,
    owner_id: &OwnerId,
) -> Result<T, CollaboratorError> {
    let mut request = request.clone();
    request.json_mode = true;
    let raw = llm.complete(&request, owner_id).await?;
    decode_structured::<T>(&raw).map_err(|source| CollaboratorError::Decode {
        service: "llm".to_string(),
        source,
    })
}

/// Fetches readable text for a URL.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &str, kind: ExtractionKind) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn describe(
        &self,
        images: &[VisionImage],
        prompt: &str,
    ) -> Result<String, CollaboratorError>;
}

/// Samples still frames from a stored video.
#[async_trait]
pub trait FrameSampler: Send + Sync {
    async fn sample_frames(
        &self,
        video_ref: &str,
        count: usize,
    ) -> Result<Vec<VisionImage>, CollaboratorError>;
}

#[async_trait]
pub trait SemanticMemory: Send + Sync {
    async fn search(
        &self,
        query: &str,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ContentSnippet>, CollaboratorError>;
}

#[async_trait]
pub trait CalendarClient: Send + Sync {
    async fn create_event(
        &self,
        owner_id: &OwnerId,
        event: &CalendarEventRequest,
    ) -> Result<CalendarEvent, CollaboratorError>;

    async fn update_event(
        &self,
        owner_id: &OwnerId,
        event_id: &str,
        event: &CalendarEventRequest,
    ) -> Result<CalendarEvent, CollaboratorError>;

    async fn delete_event(&self, owner_id: &OwnerId, event_id: &str)
    -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns whether the provider accepted the notification.
    async fn send(&self, notification: &Notification) -> Result<bool, CollaboratorError>;
}

/// Hands a persisted reminder to whatever delivers it in the future.
#[async_trait]
pub trait ReminderScheduler: Send + Sync {
    async fn schedule(
        &self,
        reminder_id: &str,
        remind_at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        content: &str,
        max_length: usize,
        owner_id: &OwnerId,
    ) -> Result<String, CollaboratorError>;
}

#[async_trait]
pub trait CaptureStore: Send + Sync {
    async fn get_capture(&self, id: &CaptureId) -> Result<Option<Capture>, StorageError>;

    async fn insert_capture(&self, capture: &Capture) -> Result<(), StorageError>;

    async fn set_status(
        &self,
        id: &CaptureId,
        status: ProcessingStatus,
    ) -> Result<(), StorageError>;

    /// Writes status `Completed` with analysis, plan, results and the
    /// reasoning trail. Repeating the same write leaves the same row.
    async fn complete_capture(
        &self,
        id: &CaptureId,
        completion: &CaptureCompletion,
    ) -> Result<(), StorageError>;

    /// Writes status `Failed` and the error under metadata `last_error`.
    async fn fail_capture(&self, id: &CaptureId, error: &str) -> Result<(), StorageError>;

    /// Completed captures of `owner_id` whose topics contain `topic`,
    /// newest first.
    async fn find_related(
        &self,
        owner_id: &OwnerId,
        topic: &str,
        exclude: &CaptureId,
        limit: usize,
    ) -> Result<Vec<RelatedCapture>, StorageError>;

    async fn recent_completed(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<Capture>, StorageError>;

    /// Captures with at least one recorded outcome, newest first.
    async fn captures_with_outcomes(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<Capture>, StorageError>;
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn find_or_create_collection(
        &self,
        owner_id: &OwnerId,
        name: &str,
    ) -> Result<Collection, StorageError>;

    /// Returns `true` when the association was new.
    async fn add_to_collection(
        &self,
        collection_id: &str,
        capture_id: &CaptureId,
    ) -> Result<bool, StorageError>;

    async fn collection_members(&self, collection_id: &str)
    -> Result<Vec<CaptureId>, StorageError>;

    /// The owner's collections, oldest first.
    async fn list_collections(&self, owner_id: &OwnerId) -> Result<Vec<Collection>, StorageError>;
}

#[async_trait]
pub trait TagStore: Send + Sync {
    async fn find_or_create_tag(&self, owner_id: &OwnerId, name: &str)
    -> Result<Tag, StorageError>;

    /// Returns `true` when the association was new.
    async fn tag_capture(&self, capture_id: &CaptureId, tag_id: &str)
    -> Result<bool, StorageError>;

    async fn capture_tags(&self, capture_id: &CaptureId) -> Result<Vec<Tag>, StorageError>;
}

#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn insert_reminder(&self, reminder: &Reminder) -> Result<(), StorageError>;

    async fn due_reminders(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reminder>, StorageError>;

    async fn mark_reminder_delivered(
        &self,
        reminder_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    async fn reminders_for_capture(
        &self,
        capture_id: &CaptureId,
    ) -> Result<Vec<Reminder>, StorageError>;
}

#[async_trait]
pub trait OutcomeStore: Send + Sync {
    async fn record_outcome(&self, outcome: &ActionOutcome) -> Result<(), StorageError>;

    /// Newest first.
    async fn recent_outcomes(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ActionOutcome>, StorageError>;
}

#[async_trait]
pub trait PatternStore: Send + Sync {
    /// Insert or replace the row keyed by (owner, pattern type).
    async fn upsert_pattern(&self, pattern: &UserPattern) -> Result<(), StorageError>;

    async fn get_pattern(
        &self,
        owner_id: &OwnerId,
        pattern_type: PatternType,
    ) -> Result<Option<UserPattern>, StorageError>;

    async fn list_patterns(&self, owner_id: &OwnerId) -> Result<Vec<UserPattern>, StorageError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn record_notification(&self, record: &NotificationRecord)
    -> Result<(), StorageError>;

    async fn mark_notification_read(
        &self,
        notification_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Notifications with a read time, newest first.
    async fn read_notifications(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>, StorageError>;
}

/// Persisted markers used to make side effects happen at most once.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Returns `true` if this call created the marker.
    async fn claim_marker(&self, key: &str, ttl: Duration) -> Result<bool, StorageError>;

    async fn has_marker(&self, key: &str) -> Result<bool, StorageError>;
}

/// Everything the pipeline persists through.
pub trait PipelineStore:
    CaptureStore
    + CollectionStore
    + TagStore
    + ReminderStore
    + OutcomeStore
    + PatternStore
    + NotificationStore
    + IdempotencyStore
{
}

impl<T> PipelineStore for T where
    T: CaptureStore
        + CollectionStore
        + TagStore
        + ReminderStore
        + OutcomeStore
        + PatternStore
        + NotificationStore
        + IdempotencyStore
{
}

/// Durable job queue with delayed retries and a dead-letter list.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: &CaptureJob) -> Result<(), StorageError>;

    async fn enqueue_delayed(&self, job: &CaptureJob, delay: Duration)
    -> Result<(), StorageError>;

    /// Waits up to `timeout` for a job. Due delayed jobs are promoted first.
    async fn poll(&self, timeout: Duration) -> Result<Option<JobDelivery>, StorageError>;

    async fn ack(&self, delivery: &JobDelivery) -> Result<(), StorageError>;

    async fn dead_letter(&self, delivery: &JobDelivery, reason: &str)
    -> Result<(), StorageError>;

    /// Ready plus delayed jobs.
    async fn depth(&self) -> Result<usize, StorageError>;
}

/// Mutual exclusion for runs of one capture.
#[async_trait]
pub trait ExecutionGuard: Send + Sync {
    /// `None` if another run holds the guard.
    async fn acquire(
        &self,
        capture_id: &CaptureId,
        ttl: Duration,
    ) -> Result<Option<GuardToken>, StorageError>;

    async fn release(&self, token: &GuardToken) -> Result<(), StorageError>;
}
