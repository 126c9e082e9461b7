//! Integration tests for the PostgreSQL store.
//!
//! These tests use the shared testcontainers PostgreSQL fixture and skip
//! when Docker is unavailable.

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;
use stash_core::traits::{
    CaptureStore, CollectionStore, IdempotencyStore, NotificationStore, OutcomeStore,
    PatternStore, ReminderStore, TagStore,
};
use stash_core::types::{
    Action, ActionOutcome, ActionPlan, ActionType, Capture, CaptureCompletion, CaptureType,
    DeepAnalysis, ExecutionResult, NotificationRecord, OwnerId, PatternType, ProcessingStatus,
    ReasoningStep, Reminder, UserPattern,
};
use std::time::Duration;
use storage::postgres::PostgresStore;

async fn store() -> Option<PostgresStore> {
    let fixture = testing::postgres().await?;
    let store = PostgresStore::new(fixture.url()).await.ok()?;
    store.initialize_schema().await.ok()?;
    Some(store)
}

fn owner() -> OwnerId {
    OwnerId::new(testing::unique_owner_id()).unwrap()
}

fn completion(capture: &Capture, topics: &[&str]) -> CaptureCompletion {
    CaptureCompletion {
        analysis: DeepAnalysis {
            title: "Rust ownership".to_string(),
            ..Default::default()
        }
        .with_topics(topics.iter().copied()),
        plan: ActionPlan {
            capture_id: capture.id.clone(),
            actions: vec![Action::new(
                ActionType::AddTag,
                json!({"tag": "rust"}),
                1,
            )],
            confidence: 0.9,
            reasoning: "tag it".to_string(),
        },
        results: vec![ExecutionResult::succeeded(ActionType::AddTag, None)],
        reasoning: vec![ReasoningStep::new("analyze", "link", json!({}))],
    }
}

#[tokio::test]
async fn test_capture_lifecycle() {
    let Some(store) = store().await else {
        eprintln!("Skipping PostgreSQL test: Docker not available");
        return;
    };
    let capture = Capture::new(owner(), CaptureType::Link, "https://example.com/rust");
    store.insert_capture(&capture).await.unwrap();

    store
        .set_status(&capture.id, ProcessingStatus::Processing)
        .await
        .unwrap();
    store.fail_capture(&capture.id, "llm timeout").await.unwrap();

    let failed = store.get_capture(&capture.id).await.unwrap().unwrap();
    assert_eq!(failed.processing_status, ProcessingStatus::Failed);
    assert_eq!(failed.metadata["last_error"], json!("llm timeout"));
    assert!(failed.analysis.is_none());

    store
        .complete_capture(&capture.id, &completion(&capture, &["rust"]))
        .await
        .unwrap();

    let done = store.get_capture(&capture.id).await.unwrap().unwrap();
    assert_eq!(done.processing_status, ProcessingStatus::Completed);
    assert!(done.processed_at.is_some());
    assert!(!done.metadata.contains_key("last_error"));
    assert!(done.metadata.contains_key("reasoning"));
    assert_eq!(done.analysis.unwrap().topics, vec!["rust".to_string()]);
    assert_eq!(done.action_results.unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_insert_conflicts() {
    let Some(store) = store().await else {
        eprintln!("Skipping PostgreSQL test: Docker not available");
        return;
    };
    let capture = Capture::new(owner(), CaptureType::Text, "note");
    store.insert_capture(&capture).await.unwrap();
    assert!(store.insert_capture(&capture).await.is_err());
}

#[tokio::test]
async fn test_update_missing_capture_is_not_found() {
    let Some(store) = store().await else {
        eprintln!("Skipping PostgreSQL test: Docker not available");
        return;
    };
    let missing = stash_core::types::CaptureId::generate();
    let err = store
        .set_status(&missing, ProcessingStatus::Processing)
        .await
        .unwrap_err();
    assert!(matches!(err, errors::StorageError::NotFound { .. }));
}

#[tokio::test]
async fn test_find_related_matches_topic_case_insensitively() {
    let Some(store) = store().await else {
        eprintln!("Skipping PostgreSQL test: Docker not available");
        return;
    };
    let owner = owner();

    let earlier = Capture::new(owner.clone(), CaptureType::Link, "https://a.example");
    store.insert_capture(&earlier).await.unwrap();
    store
        .complete_capture(&earlier.id, &completion(&earlier, &["Rust", "Async"]))
        .await
        .unwrap();

    let unrelated = Capture::new(owner.clone(), CaptureType::Link, "https://b.example");
    store.insert_capture(&unrelated).await.unwrap();
    store
        .complete_capture(&unrelated.id, &completion(&unrelated, &["cooking"]))
        .await
        .unwrap();

    let current = Capture::new(owner.clone(), CaptureType::Link, "https://c.example");
    store.insert_capture(&current).await.unwrap();

    let related = store
        .find_related(&owner, "rust", &current.id, 5)
        .await
        .unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].capture_id, earlier.id);
}

#[tokio::test]
async fn test_collections_and_tags_are_idempotent() {
    let Some(store) = store().await else {
        eprintln!("Skipping PostgreSQL test: Docker not available");
        return;
    };
    let owner = owner();
    let capture = Capture::new(owner.clone(), CaptureType::Link, "https://example.com");
    store.insert_capture(&capture).await.unwrap();

    let first = store
        .find_or_create_collection(&owner, "Reading List")
        .await
        .unwrap();
    let second = store
        .find_or_create_collection(&owner, " reading list ")
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    let listed = store.list_collections(&owner).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Reading List");

    assert!(store.add_to_collection(&first.id, &capture.id).await.unwrap());
    assert!(!store.add_to_collection(&first.id, &capture.id).await.unwrap());
    assert_eq!(
        store.collection_members(&first.id).await.unwrap(),
        vec![capture.id.clone()]
    );

    let tag = store.find_or_create_tag(&owner, "Rust").await.unwrap();
    assert!(store.tag_capture(&capture.id, &tag.id).await.unwrap());
    assert!(!store.tag_capture(&capture.id, &tag.id).await.unwrap());
    let tags = store.capture_tags(&capture.id).await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "Rust");
}

#[tokio::test]
async fn test_due_reminders_and_delivery() {
    let Some(store) = store().await else {
        eprintln!("Skipping PostgreSQL test: Docker not available");
        return;
    };
    let owner = owner();
    let capture = Capture::new(owner.clone(), CaptureType::Text, "call the bank");
    let now = Utc::now();

    let due = Reminder {
        id: testing::unique_id("reminder"),
        owner_id: owner.clone(),
        capture_id: capture.id.clone(),
        message: "call the bank".to_string(),
        remind_at: now - ChronoDuration::minutes(5),
        created_at: now,
        delivered_at: None,
    };
    let future = Reminder {
        id: testing::unique_id("reminder"),
        remind_at: now + ChronoDuration::hours(5),
        ..due.clone()
    };
    store.insert_reminder(&due).await.unwrap();
    store.insert_reminder(&future).await.unwrap();

    let pending = store.due_reminders(now, 1000).await.unwrap();
    assert!(pending.iter().any(|r| r.id == due.id));
    assert!(!pending.iter().any(|r| r.id == future.id));

    store.mark_reminder_delivered(&due.id, now).await.unwrap();
    let pending = store.due_reminders(now, 1000).await.unwrap();
    assert!(!pending.iter().any(|r| r.id == due.id));

    assert_eq!(store.reminders_for_capture(&capture.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_outcomes_and_patterns() {
    let Some(store) = store().await else {
        eprintln!("Skipping PostgreSQL test: Docker not available");
        return;
    };
    let owner = owner();
    let capture = Capture::new(owner.clone(), CaptureType::Link, "https://example.com");
    store.insert_capture(&capture).await.unwrap();
    let plan = completion(&capture, &["rust"]).plan;

    let older = ActionOutcome::new(capture.id.clone(), owner.clone(), plan.clone(), vec![])
        .with_recorded_at(Utc::now() - ChronoDuration::hours(1));
    let newer = ActionOutcome::new(
        capture.id.clone(),
        owner.clone(),
        plan,
        vec![
            ExecutionResult::succeeded(ActionType::AddTag, None),
            ExecutionResult::failed(ActionType::Notify, "down"),
        ],
    );
    store.record_outcome(&older).await.unwrap();
    store.record_outcome(&newer).await.unwrap();

    let outcomes = store.recent_outcomes(&owner, 10).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].id, newer.id, "newest outcome first");
    assert!((outcomes[0].success_rate - 0.5).abs() < f32::EPSILON);

    let with_outcomes = store.captures_with_outcomes(&owner, 10).await.unwrap();
    assert_eq!(with_outcomes.len(), 1);

    let pattern = UserPattern {
        owner_id: owner.clone(),
        pattern_type: PatternType::SaveTime,
        data: json!({"peakHours": [9]}),
        confidence: 0.3,
        updated_at: Utc::now(),
    };
    store.upsert_pattern(&pattern).await.unwrap();
    store
        .upsert_pattern(&UserPattern {
            confidence: 0.7,
            ..pattern.clone()
        })
        .await
        .unwrap();

    let stored = store
        .get_pattern(&owner, PatternType::SaveTime)
        .await
        .unwrap()
        .unwrap();
    assert!((stored.confidence - 0.7).abs() < f32::EPSILON);
    assert_eq!(store.list_patterns(&owner).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_read_notifications_only_returns_read() {
    let Some(store) = store().await else {
        eprintln!("Skipping PostgreSQL test: Docker not available");
        return;
    };
    let owner = owner();
    let record = |id: String| NotificationRecord {
        id,
        owner_id: owner.clone(),
        title: "Saved".to_string(),
        body: "Your capture is ready".to_string(),
        action_tag: None,
        sent_at: Utc::now(),
        read_at: None,
    };
    let read = record(testing::unique_id("notification"));
    let unread = record(testing::unique_id("notification"));
    store.record_notification(&read).await.unwrap();
    store.record_notification(&unread).await.unwrap();
    store
        .mark_notification_read(&read.id, Utc::now())
        .await
        .unwrap();

    let records = store.read_notifications(&owner, 10).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, read.id);
}

#[tokio::test]
async fn test_marker_claimed_once() {
    let Some(store) = store().await else {
        eprintln!("Skipping PostgreSQL test: Docker not available");
        return;
    };
    let key = testing::unique_id("marker");

    assert!(!store.has_marker(&key).await.unwrap());
    assert!(store.claim_marker(&key, Duration::from_secs(60)).await.unwrap());
    assert!(!store.claim_marker(&key, Duration::from_secs(60)).await.unwrap());
    assert!(store.has_marker(&key).await.unwrap());
}
