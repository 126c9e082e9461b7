//! Queue-backed pipeline over PostgreSQL and Redis.
//!
//! Uses the shared testcontainers fixtures and skips when Docker is
//! unavailable.

use adapters::mock::{
    MockCalendar, MockExtractor, MockFrameSampler, MockLlm, MockNotifier, MockScheduler,
    MockSemanticMemory, MockSummarizer, MockVision,
};
use config::Config;
use pipeline::{
    Collaborators, DispatchMode, Dispatcher, JobDisposition, TaskSupervisor, WorkerPool,
    build_coordinator,
};
use stash_core::jobs::RetryPolicy;
use stash_core::traits::{CaptureStore, JobQueue, TagStore};
use stash_core::types::{Capture, CaptureType, OwnerId, ProcessingStatus};
use std::sync::Arc;
use std::time::Duration;
use storage::{PostgresStore, RedisJobQueue, RedisStorage};

struct Backends {
    store: Arc<PostgresStore>,
    redis: Arc<RedisStorage>,
    queue: Arc<RedisJobQueue>,
}

async fn backends() -> Option<Backends> {
    let postgres = testing::postgres().await?;
    let redis = testing::redis().await?;
    let store = PostgresStore::new(postgres.url()).await.ok()?;
    store.initialize_schema().await.ok()?;
    let redis = RedisStorage::with_prefix(redis.url(), &testing::unique_id("stash-cross"))
        .await
        .ok()?;
    let queue = RedisJobQueue::new(&redis, &testing::unique_queue_name());
    Some(Backends {
        store: Arc::new(store),
        redis: Arc::new(redis),
        queue: Arc::new(queue),
    })
}

async fn collaborators() -> (Collaborators, Arc<MockNotifier>) {
    let llm = Arc::new(MockLlm::new());
    llm.add_response(
        "Plan actions",
        r#"{"actions": [{"type": "add_tag", "data": {"tags": ["rust"]}, "priority": 1}],
            "confidence": 0.9, "reasoning": "tag it"}"#,
    )
    .await;
    llm.set_default_response(r#"{"title": "Ownership", "topics": ["rust"]}"#)
        .await;
    let notifier = Arc::new(MockNotifier::new());
    let collaborators = Collaborators {
        llm,
        extractor: Arc::new(MockExtractor::new()),
        vision: Arc::new(MockVision::new("{}")),
        frames: Arc::new(MockFrameSampler::new()),
        memory: Arc::new(MockSemanticMemory::default()),
        calendar: Arc::new(MockCalendar::new()),
        notifier: notifier.clone(),
        scheduler: Arc::new(MockScheduler::new()),
        summarizer: Arc::new(MockSummarizer::new()),
    };
    (collaborators, notifier)
}

#[tokio::test]
async fn submitted_capture_is_processed_by_worker() {
    let Some(backends) = backends().await else {
        eprintln!("Skipping durable pipeline test: Docker not available");
        return;
    };
    let (collaborators, notifier) = collaborators().await;
    let supervisor = TaskSupervisor::new();
    let coordinator = Arc::new(build_coordinator(
        &Config::default(),
        backends.store.clone(),
        backends.redis.clone(),
        &collaborators,
        supervisor.clone(),
    ));
    let dispatcher = Dispatcher::new(
        DispatchMode::QueueBacked(backends.queue.clone()),
        coordinator.clone(),
        supervisor,
    );

    let owner = OwnerId::new(testing::unique_owner_id()).unwrap();
    let capture = Capture::new(owner.clone(), CaptureType::Text, "Notes on ownership");
    backends.store.insert_capture(&capture).await.unwrap();

    let accepted = dispatcher
        .submit(capture.id.clone(), owner.clone())
        .await
        .unwrap();
    assert!(accepted.job_id.is_some());
    assert_eq!(backends.queue.depth().await.unwrap(), 1);

    let pool = WorkerPool::new(
        backends.queue.clone(),
        coordinator,
        RetryPolicy::default(),
        1,
        Duration::from_secs(1),
    );
    let disposition = pool.run_once().await.unwrap().unwrap();
    assert_eq!(disposition, JobDisposition::Completed);
    assert_eq!(backends.queue.depth().await.unwrap(), 0);

    let stored = backends
        .store
        .get_capture(&capture.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.processing_status, ProcessingStatus::Completed);
    let tags = backends.store.capture_tags(&capture.id).await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name, "rust");
    assert_eq!(notifier.sent().await.len(), 1);
}
