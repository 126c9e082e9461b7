//! In-process backend implementing every store trait, the job queue and the
//! execution guard. Used by the in-process dispatch mode, the CLI `process`
//! command and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use errors::StorageError;
use parking_lot::{Mutex, RwLock};
use stash_core::jobs::{CaptureJob, GuardToken, JobDelivery};
use stash_core::traits::{
    CaptureStore, CollectionStore, ExecutionGuard, IdempotencyStore, JobQueue, NotificationStore,
    OutcomeStore, PatternStore, ReminderStore, TagStore,
};
use stash_core::types::{
    ActionOutcome, Capture, CaptureCompletion, CaptureId, Collection, NotificationRecord, OwnerId,
    PatternType, ProcessingStatus, RelatedCapture, Reminder, Tag, UserPattern,
};
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

const BACKEND: &str = "memory";

fn not_found(id: &str) -> StorageError {
    StorageError::NotFound {
        backend: BACKEND.to_string(),
        id: id.to_string(),
    }
}

/// Lowercased, trimmed name used for per-owner uniqueness.
pub(crate) fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Default)]
pub struct InMemoryStore {
    captures: DashMap<CaptureId, Capture>,
    collections: DashMap<(OwnerId, String), Collection>,
    collection_members: DashMap<String, Vec<CaptureId>>,
    tags: DashMap<(OwnerId, String), Tag>,
    capture_tags: DashMap<CaptureId, Vec<Tag>>,
    reminders: DashMap<String, Reminder>,
    outcomes: RwLock<Vec<ActionOutcome>>,
    patterns: DashMap<(OwnerId, PatternType), UserPattern>,
    notifications: RwLock<Vec<NotificationRecord>>,
    markers: DashMap<String, Instant>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded notification, read or not, in send order.
    pub fn sent_notifications(&self) -> Vec<NotificationRecord> {
        self.notifications.read().clone()
    }

    fn update_capture<F>(&self, id: &CaptureId, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Capture),
    {
        let mut entry = self
            .captures
            .get_mut(id)
            .ok_or_else(|| not_found(id.as_str()))?;
        f(entry.value_mut());
        entry.updated_at = Utc::now();
        Ok(())
    }
}

fn has_topic(capture: &Capture, topic: &str) -> bool {
    capture.analysis.as_ref().is_some_and(|analysis| {
        analysis
            .topics
            .iter()
            .any(|t| t.eq_ignore_ascii_case(topic))
    })
}

#[async_trait]
impl CaptureStore for InMemoryStore {
    async fn get_capture(&self, id: &CaptureId) -> Result<Option<Capture>, StorageError> {
        Ok(self.captures.get(id).map(|c| c.value().clone()))
    }

    async fn insert_capture(&self, capture: &Capture) -> Result<(), StorageError> {
        if self.captures.contains_key(&capture.id) {
            return Err(StorageError::Conflict {
                backend: BACKEND.to_string(),
                reason: format!("capture {} already exists", capture.id),
            });
        }
        self.captures.insert(capture.id.clone(), capture.clone());
        Ok(())
    }

    async fn set_status(
        &self,
        id: &CaptureId,
        status: ProcessingStatus,
    ) -> Result<(), StorageError> {
        self.update_capture(id, |c| c.processing_status = status)
    }

    async fn complete_capture(
        &self,
        id: &CaptureId,
        completion: &CaptureCompletion,
    ) -> Result<(), StorageError> {
        let patch = completion
            .metadata_patch()
            .map_err(|e| StorageError::SerializationError {
                error_type: "JSON".to_string(),
                reason: e.to_string(),
            })?;
        self.update_capture(id, |c| {
            c.processing_status = ProcessingStatus::Completed;
            c.analysis = Some(completion.analysis.clone());
            c.action_plan = Some(completion.plan.clone());
            c.action_results = Some(completion.results.clone());
            c.metadata.remove("last_error");
            c.metadata.extend(patch);
            if c.processed_at.is_none() {
                c.processed_at = Some(Utc::now());
            }
        })
    }

    async fn fail_capture(&self, id: &CaptureId, error: &str) -> Result<(), StorageError> {
        self.update_capture(id, |c| {
            c.processing_status = ProcessingStatus::Failed;
            c.metadata.insert(
                "last_error".to_string(),
                serde_json::Value::String(error.to_string()),
            );
        })
    }

    async fn find_related(
        &self,
        owner_id: &OwnerId,
        topic: &str,
        exclude: &CaptureId,
        limit: usize,
    ) -> Result<Vec<RelatedCapture>, StorageError> {
        let mut related: Vec<RelatedCapture> = self
            .captures
            .iter()
            .filter(|c| {
                &c.owner_id == owner_id
                    && &c.id != exclude
                    && c.processing_status == ProcessingStatus::Completed
                    && has_topic(c, topic)
            })
            .map(|c| RelatedCapture {
                capture_id: c.id.clone(),
                title: c
                    .analysis
                    .as_ref()
                    .map(|a| a.title.clone())
                    .unwrap_or_default(),
                topics: c
                    .analysis
                    .as_ref()
                    .map(|a| a.topics.clone())
                    .unwrap_or_default(),
                created_at: c.created_at,
            })
            .collect();
        related.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        related.truncate(limit);
        Ok(related)
    }

    async fn recent_completed(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<Capture>, StorageError> {
        let mut captures: Vec<Capture> = self
            .captures
            .iter()
            .filter(|c| {
                &c.owner_id == owner_id && c.processing_status == ProcessingStatus::Completed
            })
            .map(|c| c.value().clone())
            .collect();
        captures.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        captures.truncate(limit);
        Ok(captures)
    }

    async fn captures_with_outcomes(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<Capture>, StorageError> {
        let with_outcomes: HashSet<CaptureId> = self
            .outcomes
            .read()
            .iter()
            .filter(|o| &o.owner_id == owner_id)
            .map(|o| o.capture_id.clone())
            .collect();
        let mut captures: Vec<Capture> = with_outcomes
            .iter()
            .filter_map(|id| self.captures.get(id).map(|c| c.value().clone()))
            .collect();
        captures.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        captures.truncate(limit);
        Ok(captures)
    }
}

#[async_trait]
impl CollectionStore for InMemoryStore {
    async fn find_or_create_collection(
        &self,
        owner_id: &OwnerId,
        name: &str,
    ) -> Result<Collection, StorageError> {
        let entry = self
            .collections
            .entry((owner_id.clone(), name_key(name)))
            .or_insert_with(|| Collection {
                id: uuid::Uuid::new_v4().to_string(),
                owner_id: owner_id.clone(),
                name: name.trim().to_string(),
                created_at: Utc::now(),
            });
        Ok(entry.value().clone())
    }

    async fn add_to_collection(
        &self,
        collection_id: &str,
        capture_id: &CaptureId,
    ) -> Result<bool, StorageError> {
        let mut members = self
            .collection_members
            .entry(collection_id.to_string())
            .or_default();
        if members.contains(capture_id) {
            return Ok(false);
        }
        members.push(capture_id.clone());
        Ok(true)
    }

    async fn collection_members(
        &self,
        collection_id: &str,
    ) -> Result<Vec<CaptureId>, StorageError> {
        Ok(self
            .collection_members
            .get(collection_id)
            .map(|m| m.value().clone())
            .unwrap_or_default())
    }

    async fn list_collections(&self, owner_id: &OwnerId) -> Result<Vec<Collection>, StorageError> {
        let mut collections: Vec<Collection> = self
            .collections
            .iter()
            .filter(|entry| &entry.key().0 == owner_id)
            .map(|entry| entry.value().clone())
            .collect();
        collections.sort_by_key(|c| c.created_at);
        Ok(collections)
    }
}

#[async_trait]
impl TagStore for InMemoryStore {
    async fn find_or_create_tag(
        &self,
        owner_id: &OwnerId,
        name: &str,
    ) -> Result<Tag, StorageError> {
        let entry = self
            .tags
            .entry((owner_id.clone(), name_key(name)))
            .or_insert_with(|| Tag {
                id: uuid::Uuid::new_v4().to_string(),
                owner_id: owner_id.clone(),
                name: name.trim().to_string(),
            });
        Ok(entry.value().clone())
    }

    async fn tag_capture(
        &self,
        capture_id: &CaptureId,
        tag_id: &str,
    ) -> Result<bool, StorageError> {
        let tag = self
            .tags
            .iter()
            .find(|t| t.id == tag_id)
            .map(|t| t.value().clone())
            .ok_or_else(|| not_found(tag_id))?;
        let mut tags = self.capture_tags.entry(capture_id.clone()).or_default();
        if tags.iter().any(|t| t.id == tag_id) {
            return Ok(false);
        }
        tags.push(tag);
        Ok(true)
    }

    async fn capture_tags(&self, capture_id: &CaptureId) -> Result<Vec<Tag>, StorageError> {
        Ok(self
            .capture_tags
            .get(capture_id)
            .map(|t| t.value().clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ReminderStore for InMemoryStore {
    async fn insert_reminder(&self, reminder: &Reminder) -> Result<(), StorageError> {
        self.reminders.insert(reminder.id.clone(), reminder.clone());
        Ok(())
    }

    async fn due_reminders(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reminder>, StorageError> {
        let mut due: Vec<Reminder> = self
            .reminders
            .iter()
            .filter(|r| r.delivered_at.is_none() && r.remind_at <= now)
            .map(|r| r.value().clone())
            .collect();
        due.sort_by(|a, b| a.remind_at.cmp(&b.remind_at));
        due.truncate(limit);
        Ok(due)
    }

    async fn mark_reminder_delivered(
        &self,
        reminder_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut reminder = self
            .reminders
            .get_mut(reminder_id)
            .ok_or_else(|| not_found(reminder_id))?;
        reminder.delivered_at = Some(at);
        Ok(())
    }

    async fn reminders_for_capture(
        &self,
        capture_id: &CaptureId,
    ) -> Result<Vec<Reminder>, StorageError> {
        Ok(self
            .reminders
            .iter()
            .filter(|r| &r.capture_id == capture_id)
            .map(|r| r.value().clone())
            .collect())
    }
}

#[async_trait]
impl OutcomeStore for InMemoryStore {
    async fn record_outcome(&self, outcome: &ActionOutcome) -> Result<(), StorageError> {
        self.outcomes.write().push(outcome.clone());
        Ok(())
    }

    async fn recent_outcomes(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ActionOutcome>, StorageError> {
        let mut outcomes: Vec<ActionOutcome> = self
            .outcomes
            .read()
            .iter()
            .filter(|o| &o.owner_id == owner_id)
            .cloned()
            .collect();
        outcomes.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        outcomes.truncate(limit);
        Ok(outcomes)
    }
}

#[async_trait]
impl PatternStore for InMemoryStore {
    async fn upsert_pattern(&self, pattern: &UserPattern) -> Result<(), StorageError> {
        self.patterns.insert(
            (pattern.owner_id.clone(), pattern.pattern_type),
            pattern.clone(),
        );
        Ok(())
    }

    async fn get_pattern(
        &self,
        owner_id: &OwnerId,
        pattern_type: PatternType,
    ) -> Result<Option<UserPattern>, StorageError> {
        Ok(self
            .patterns
            .get(&(owner_id.clone(), pattern_type))
            .map(|p| p.value().clone()))
    }

    async fn list_patterns(&self, owner_id: &OwnerId) -> Result<Vec<UserPattern>, StorageError> {
        let mut patterns: Vec<UserPattern> = self
            .patterns
            .iter()
            .filter(|p| &p.owner_id == owner_id)
            .map(|p| p.value().clone())
            .collect();
        patterns.sort_by_key(|p| p.pattern_type.to_string());
        Ok(patterns)
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn record_notification(
        &self,
        record: &NotificationRecord,
    ) -> Result<(), StorageError> {
        self.notifications.write().push(record.clone());
        Ok(())
    }

    async fn mark_notification_read(
        &self,
        notification_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut notifications = self.notifications.write();
        let record = notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or_else(|| not_found(notification_id))?;
        record.read_at = Some(at);
        Ok(())
    }

    async fn read_notifications(
        &self,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>, StorageError> {
        let mut read: Vec<NotificationRecord> = self
            .notifications
            .read()
            .iter()
            .filter(|n| &n.owner_id == owner_id && n.read_at.is_some())
            .cloned()
            .collect();
        read.sort_by(|a, b| b.read_at.cmp(&a.read_at));
        read.truncate(limit);
        Ok(read)
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryStore {
    async fn claim_marker(&self, key: &str, ttl: Duration) -> Result<bool, StorageError> {
        let now = Instant::now();
        let mut entry = self.markers.entry(key.to_string()).or_insert(now);
        // A fresh insert carries `now` as its expiry; treat it like an
        // expired marker and stamp the real deadline.
        if *entry > now {
            return Ok(false);
        }
        *entry = now + ttl;
        Ok(true)
    }

    async fn has_marker(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self
            .markers
            .get(key)
            .is_some_and(|expiry| *expiry > Instant::now()))
    }
}

/// In-process job queue with delayed retries and a dead-letter list.
#[derive(Default)]
pub struct InMemoryJobQueue {
    ready: Mutex<VecDeque<CaptureJob>>,
    delayed: Mutex<Vec<(Instant, CaptureJob)>>,
    in_flight: DashMap<String, CaptureJob>,
    dead: Mutex<Vec<(CaptureJob, String)>>,
    wakeup: Notify,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dead_letters(&self) -> Vec<(CaptureJob, String)> {
        self.dead.lock().clone()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn promote_due(&self) -> Option<Instant> {
        let now = Instant::now();
        let mut delayed = self.delayed.lock();
        let mut ready = self.ready.lock();
        let mut next_due = None;
        delayed.retain(|(due, job)| {
            if *due <= now {
                ready.push_back(job.clone());
                false
            } else {
                next_due = Some(next_due.map_or(*due, |n: Instant| n.min(*due)));
                true
            }
        });
        next_due
    }

    fn try_take(&self) -> (Option<JobDelivery>, Option<Instant>) {
        let next_due = self.promote_due();
        let job = self.ready.lock().pop_front();
        let delivery = job.map(|job| {
            let receipt = uuid::Uuid::new_v4().to_string();
            self.in_flight.insert(receipt.clone(), job.clone());
            JobDelivery { job, receipt }
        });
        (delivery, next_due)
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: &CaptureJob) -> Result<(), StorageError> {
        self.ready.lock().push_back(job.clone());
        self.wakeup.notify_one();
        Ok(())
    }

    async fn enqueue_delayed(
        &self,
        job: &CaptureJob,
        delay: Duration,
    ) -> Result<(), StorageError> {
        self.delayed
            .lock()
            .push((Instant::now() + delay, job.clone()));
        self.wakeup.notify_one();
        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> Result<Option<JobDelivery>, StorageError> {
        let deadline = Instant::now() + timeout;
        loop {
            let (delivery, next_due) = self.try_take();
            if delivery.is_some() {
                return Ok(delivery);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let wake_at = next_due.map_or(deadline, |due| due.min(deadline));
            let _ = tokio::time::timeout(
                wake_at.saturating_duration_since(now),
                self.wakeup.notified(),
            ).await;
        }
    }

    async fn ack(&self, delivery: &JobDelivery) -> Result<(), StorageError> {
        self.in_flight.remove(&delivery.receipt);
        Ok(())
    }

    async fn dead_letter(&self, delivery: &JobDelivery, reason: &str) -> Result<(), StorageError> {
        self.in_flight.remove(&delivery.receipt);
        self.dead
            .lock()
            .push((delivery.job.clone(), reason.to_string()));
        Ok(())
    }

    async fn depth(&self) -> Result<usize, StorageError> {
        Ok(self.ready.lock().len() + self.delayed.lock().len())
    }
}

/// Per-capture lock set for a single process.
#[derive(Default)]
pub struct InProcessGuard {
    held: DashMap<CaptureId, (String, Instant)>,
}

impl InProcessGuard {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionGuard for InProcessGuard {
    async fn acquire(
        &self,
        capture_id: &CaptureId,
        ttl: Duration,
    ) -> Result<Option<GuardToken>, StorageError> {
        let now = Instant::now();
        let token = GuardToken::new(capture_id.clone());
        let mut entry = self
            .held
            .entry(capture_id.clone())
            .or_insert_with(|| (String::new(), now));
        if !entry.0.is_empty() && entry.1 > now {
            return Ok(None);
        }
        *entry = (token.token.clone(), now + ttl);
        Ok(Some(token))
    }

    async fn release(&self, token: &GuardToken) -> Result<(), StorageError> {
        self.held
            .remove_if(&token.capture_id, |_, (held, _)| held == &token.token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_core::types::{ActionPlan, ActionType, CaptureType, DeepAnalysis, ExecutionResult};

    fn owner(id: &str) -> OwnerId {
        OwnerId::new(id.to_string()).unwrap()
    }

    fn completion(capture_id: &CaptureId, topics: &[&str]) -> CaptureCompletion {
        CaptureCompletion {
            analysis: DeepAnalysis {
                title: "Async Rust".to_string(),
                ..DeepAnalysis::default()
            }
            .with_topics(topics.iter().copied()),
            plan: ActionPlan {
                capture_id: capture_id.clone(),
                actions: vec![],
                confidence: 0.9,
                reasoning: "test".to_string(),
            },
            results: Vec::<ExecutionResult>::new(),
            reasoning: vec![],
        }
    }

    #[tokio::test]
    async fn test_complete_capture_is_idempotent() {
        let store = InMemoryStore::new();
        let capture = Capture::new(owner("u1"), CaptureType::Text, "hello");
        store.insert_capture(&capture).await.unwrap();
        store
            .set_status(&capture.id, ProcessingStatus::Processing)
            .await
            .unwrap();

        let done = completion(&capture.id, &["rust"]);
        store.complete_capture(&capture.id, &done).await.unwrap();
        let first = store.get_capture(&capture.id).await.unwrap().unwrap();
        store.complete_capture(&capture.id, &done).await.unwrap();
        let second = store.get_capture(&capture.id).await.unwrap().unwrap();

        assert_eq!(first.processing_status, ProcessingStatus::Completed);
        assert_eq!(first.analysis, second.analysis);
        assert_eq!(first.processed_at, second.processed_at);
        assert!(second.metadata.contains_key("reasoning"));
    }

    #[tokio::test]
    async fn test_complete_capture_writes_summary_from_results() {
        let store = InMemoryStore::new();
        let capture = Capture::new(owner("u1"), CaptureType::Link, "https://example.com");
        store.insert_capture(&capture).await.unwrap();

        let mut done = completion(&capture.id, &[]);
        done.results = vec![
            ExecutionResult::failed(ActionType::Summarize, "summarizer down".to_string()),
            ExecutionResult::succeeded(
                ActionType::Summarize,
                Some(serde_json::json!({"summary": "Short version"})),
            ),
        ];
        store.complete_capture(&capture.id, &done).await.unwrap();

        let stored = store.get_capture(&capture.id).await.unwrap().unwrap();
        assert_eq!(stored.metadata["summary"], "Short version");
    }

    #[tokio::test]
    async fn test_fail_capture_records_error_only() {
        let store = InMemoryStore::new();
        let capture = Capture::new(owner("u1"), CaptureType::Text, "hello");
        store.insert_capture(&capture).await.unwrap();

        store.fail_capture(&capture.id, "boom").await.unwrap();
        let failed = store.get_capture(&capture.id).await.unwrap().unwrap();
        assert_eq!(failed.processing_status, ProcessingStatus::Failed);
        assert!(failed.analysis.is_none());
        assert!(failed.action_plan.is_none());
        assert_eq!(failed.metadata["last_error"], "boom");
    }

    #[tokio::test]
    async fn test_find_related_matches_topic_case_insensitively() {
        let store = InMemoryStore::new();
        let u1 = owner("u1");
        for i in 0..7 {
            let capture = Capture::new(u1.clone(), CaptureType::Link, format!("https://x/{i}"))
                .with_created_at(Utc::now() - chrono::Duration::minutes(i));
            store.insert_capture(&capture).await.unwrap();
            store
                .complete_capture(&capture.id, &completion(&capture.id, &["Rust", "tokio"]))
                .await
                .unwrap();
        }
        let other = Capture::new(owner("u2"), CaptureType::Link, "https://y");
        store.insert_capture(&other).await.unwrap();
        store
            .complete_capture(&other.id, &completion(&other.id, &["rust"]))
            .await
            .unwrap();

        let current = CaptureId::generate();
        let related = store.find_related(&u1, "rust", &current, 5).await.unwrap();
        assert_eq!(related.len(), 5);
        assert!(
            related
                .windows(2)
                .all(|w| w[0].created_at >= w[1].created_at)
        );
    }

    #[tokio::test]
    async fn test_find_or_create_and_associations_are_idempotent() {
        let store = InMemoryStore::new();
        let u1 = owner("u1");
        let capture_id = CaptureId::generate();

        let a = store.find_or_create_collection(&u1, "Reading").await.unwrap();
        let b = store
            .find_or_create_collection(&u1, " reading ")
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
        assert!(store.add_to_collection(&a.id, &capture_id).await.unwrap());
        assert!(!store.add_to_collection(&a.id, &capture_id).await.unwrap());
        assert_eq!(store.collection_members(&a.id).await.unwrap().len(), 1);

        let tag = store.find_or_create_tag(&u1, "rust").await.unwrap();
        assert!(store.tag_capture(&capture_id, &tag.id).await.unwrap());
        assert!(!store.tag_capture(&capture_id, &tag.id).await.unwrap());
        assert_eq!(store.capture_tags(&capture_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_collections_is_scoped_to_owner() {
        let store = InMemoryStore::new();
        let u1 = owner("u1");
        let u2 = owner("u2");
        store.find_or_create_collection(&u1, "Reading").await.unwrap();
        store.find_or_create_collection(&u1, "Recipes").await.unwrap();
        store.find_or_create_collection(&u2, "Travel").await.unwrap();

        let mut names: Vec<String> = store
            .list_collections(&u1)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Reading", "Recipes"]);
        assert!(store.list_collections(&owner("u3")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_markers_claim_once() {
        let store = InMemoryStore::new();
        assert!(
            store
                .claim_marker("reminder:u1:c1:1", Duration::from_secs(60))
                .await
                .unwrap()
        );
        assert!(
            !store
                .claim_marker("reminder:u1:c1:1", Duration::from_secs(60))
                .await
                .unwrap()
        );
        assert!(store.has_marker("reminder:u1:c1:1").await.unwrap());
        assert!(!store.has_marker("reminder:u1:c1:2").await.unwrap());
    }

    #[tokio::test]
    async fn test_due_reminders_skip_delivered() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let reminder = Reminder {
            id: "r1".to_string(),
            owner_id: owner("u1"),
            capture_id: CaptureId::generate(),
            message: "read it".to_string(),
            remind_at: now - chrono::Duration::minutes(1),
            created_at: now,
            delivered_at: None,
        };
        store.insert_reminder(&reminder).await.unwrap();
        assert_eq!(store.due_reminders(now, 10).await.unwrap().len(), 1);

        store.mark_reminder_delivered("r1", now).await.unwrap();
        assert!(store.due_reminders(now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queue_delivers_delayed_jobs_after_delay() {
        let queue = InMemoryJobQueue::new();
        let job = CaptureJob::new(CaptureId::generate(), owner("u1"));
        queue
            .enqueue_delayed(&job, Duration::from_millis(50))
            .await
            .unwrap();

        assert!(
            queue
                .poll(Duration::from_millis(5))
                .await
                .unwrap()
                .is_none()
        );
        let delivery = queue
            .poll(Duration::from_millis(500))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivery.job.capture_id, job.capture_id);
        assert_eq!(queue.in_flight(), 1);

        queue.ack(&delivery).await.unwrap();
        assert_eq!(queue.in_flight(), 0);
        assert_eq!(queue.depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_queue_dead_letter() {
        let queue = InMemoryJobQueue::new();
        let job = CaptureJob::new(CaptureId::generate(), owner("u1"));
        queue.enqueue(&job).await.unwrap();
        let delivery = queue.poll(Duration::from_millis(10)).await.unwrap().unwrap();
        queue.dead_letter(&delivery, "exhausted").await.unwrap();

        let dead = queue.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].1, "exhausted");
    }

    #[tokio::test]
    async fn test_guard_excludes_concurrent_runs() {
        let guard = InProcessGuard::new();
        let id = CaptureId::generate();
        let token = guard
            .acquire(&id, Duration::from_secs(60))
            .await
            .unwrap()
            .unwrap();
        assert!(
            guard
                .acquire(&id, Duration::from_secs(60))
                .await
                .unwrap()
                .is_none()
        );

        guard.release(&token).await.unwrap();
        assert!(
            guard
                .acquire(&id, Duration::from_secs(60))
                .await
                .unwrap()
                .is_some()
        );
    }
}
