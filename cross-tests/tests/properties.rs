//! Pipeline properties over generated plans and outcome counts.

use adapters::mock::{MockCalendar, MockNotifier, MockScheduler, MockSummarizer};
use config::{ExecutorConfig, LearnerConfig};
use pipeline::{Executor, Learner, TaskSupervisor};
use proptest::prelude::*;
use serde_json::{Value, json};
use stash_core::traits::{CaptureStore, CollectionStore, OutcomeStore, PatternStore, TagStore};
use stash_core::types::{
    Action, ActionOutcome, ActionPlan, ActionType, Capture, CaptureType, OwnerId,
};
use std::sync::Arc;
use storage::InMemoryStore;

fn owner() -> OwnerId {
    OwnerId::new("property-owner".to_string()).unwrap()
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn executor(store: Arc<InMemoryStore>, calendar_fails: bool) -> Executor {
    let calendar = if calendar_fails {
        MockCalendar::failing()
    } else {
        MockCalendar::new()
    };
    Executor::new(
        store,
        Arc::new(calendar),
        Arc::new(MockNotifier::new()),
        Arc::new(MockScheduler::new()),
        Arc::new(MockSummarizer::new()),
        ExecutorConfig::default(),
    )
}

fn arb_action() -> impl Strategy<Value = Action> {
    let payload = prop_oneof![
        Just((ActionType::AddTag, json!({"tags": ["rust", "async"]}))),
        Just((ActionType::AddTag, json!({"tags": []}))),
        Just((ActionType::AddToCollection, json!({"collection": "Reading"}))),
        Just((ActionType::AddToCollection, Value::Null)),
        Just((ActionType::CreateReminder, json!({"message": "Revisit"}))),
        Just((
            ActionType::CreateCalendarEvent,
            json!({"title": "Talk", "start": "2026-11-02T09:00:00Z"})
        )),
        Just((ActionType::CreateCalendarEvent, json!({"start": "next week"}))),
        Just((ActionType::Notify, json!({"title": "Saved", "body": "Done"}))),
        Just((ActionType::Summarize, json!({"maxLength": 80}))),
        Just((ActionType::ExtractEntities, json!({}))),
    ];
    (payload, -5i32..10).prop_map(|((action_type, data), priority)| {
        Action::new(action_type, data, priority)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_one_result_per_action(
        actions in proptest::collection::vec(arb_action(), 0..8),
        calendar_fails in any::<bool>(),
    ) {
        let results = block_on(async {
            let store = Arc::new(InMemoryStore::new());
            let capture = Capture::new(owner(), CaptureType::Text, "Generated capture body");
            store.insert_capture(&capture).await.unwrap();
            let plan = ActionPlan {
                capture_id: capture.id.clone(),
                actions: actions.clone(),
                confidence: 0.9,
                reasoning: String::new(),
            };
            executor(store, calendar_fails).execute(&plan, &owner()).await
        });

        prop_assert_eq!(results.len(), actions.len());
        for result in &results {
            prop_assert!(result.success || result.error.is_some());
        }
    }

    #[test]
    fn prop_mining_below_five_outcomes_writes_nothing(count in 0usize..5) {
        let patterns = block_on(async {
            let store = Arc::new(InMemoryStore::new());
            for i in 0..count {
                let capture = Capture::new(owner(), CaptureType::Text, format!("note {i}"));
                store.insert_capture(&capture).await.unwrap();
                let plan = ActionPlan {
                    capture_id: capture.id.clone(),
                    actions: vec![],
                    confidence: 0.8,
                    reasoning: String::new(),
                };
                store
                    .record_outcome(&ActionOutcome::new(capture.id, owner(), plan, vec![]))
                    .await
                    .unwrap();
            }
            let learner = Learner::new(store.clone(), TaskSupervisor::new(), LearnerConfig::default());
            let report = learner.mine_patterns(&owner()).await;
            assert!(report.skipped);
            store.list_patterns(&owner()).await.unwrap()
        });

        prop_assert!(patterns.is_empty());
    }

    #[test]
    fn prop_tag_and_collection_are_idempotent(runs in 1usize..4) {
        let (tags, members) = block_on(async {
            let store = Arc::new(InMemoryStore::new());
            let capture = Capture::new(owner(), CaptureType::Link, "https://example.com");
            store.insert_capture(&capture).await.unwrap();
            let plan = ActionPlan {
                capture_id: capture.id.clone(),
                actions: vec![
                    Action::new(ActionType::AddTag, json!({"tags": ["Rust", "rust ", "tokio"]}), 2),
                    Action::new(ActionType::AddToCollection, json!({"collection": "Reading"}), 1),
                ],
                confidence: 0.9,
                reasoning: String::new(),
            };
            let executor = executor(store.clone(), false);
            for _ in 0..runs {
                let results = executor.execute(&plan, &owner()).await;
                assert!(results.iter().all(|r| r.success));
            }
            let tags = store.capture_tags(&capture.id).await.unwrap();
            let collection = store.find_or_create_collection(&owner(), "Reading").await.unwrap();
            let members = store.collection_members(&collection.id).await.unwrap();
            (tags, members)
        });

        prop_assert_eq!(tags.len(), 2);
        prop_assert_eq!(members.len(), 1);
    }
}
