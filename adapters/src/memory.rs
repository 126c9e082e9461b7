use async_trait::async_trait;
use errors::CollaboratorError;
use stash_core::traits::{CaptureStore, SemanticMemory};
use stash_core::types::{Capture, ContentSnippet, OwnerId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const SERVICE: &str = "semantic_memory";

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

/// Lowercased alphanumeric tokens longer than two characters, minus stop
/// words.
pub fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f32 / union as f32
}

/// Semantic memory over the owner's completed captures, ranked by keyword
/// overlap with the query.
pub struct StoreSemanticMemory {
    store: Arc<dyn CaptureStore>,
    window: usize,
}

impl StoreSemanticMemory {
    pub fn new(store: Arc<dyn CaptureStore>) -> Self {
        Self { store, window: 200 }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }
}

fn searchable_text(capture: &Capture) -> String {
    match &capture.analysis {
        Some(analysis) => format!(
            "{} {} {}",
            analysis.title,
            analysis.description,
            analysis.topics.join(" ")
        ),
        None => capture.content.clone(),
    }
}

fn snippet(capture: &Capture, score: f32) -> ContentSnippet {
    let (content, title, topics) = match &capture.analysis {
        Some(analysis) => (
            format!("{}: {}", analysis.title, analysis.description),
            analysis.title.clone(),
            analysis.topics.clone(),
        ),
        None => (capture.content.clone(), String::new(), Vec::new()),
    };

    let mut metadata = HashMap::new();
    metadata.insert(
        "captureId".to_string(),
        serde_json::Value::String(capture.id.to_string()),
    );
    metadata.insert("title".to_string(), serde_json::Value::String(title));
    metadata.insert("topics".to_string(), serde_json::json!(topics));
    metadata.insert(
        "captureType".to_string(),
        serde_json::Value::String(capture.capture_type.to_string()),
    );

    ContentSnippet {
        content,
        score,
        metadata,
    }
}

#[async_trait]
impl SemanticMemory for StoreSemanticMemory {
    async fn search(
        &self,
        query: &str,
        owner_id: &OwnerId,
        limit: usize,
    ) -> Result<Vec<ContentSnippet>, CollaboratorError> {
        let query_words = keywords(query);
        if query_words.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let captures = self
            .store
            .recent_completed(owner_id, self.window)
            .await
            .map_err(|e| CollaboratorError::Transport {
                service: SERVICE.to_string(),
                reason: e.to_string(),
            })?;

        let mut scored: Vec<(f32, &Capture)> = captures
            .iter()
            .map(|c| (jaccard(&query_words, &keywords(&searchable_text(c))), c))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, capture)| snippet(capture, score))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_core::traits::CaptureStore;
    use stash_core::types::{
        ActionPlan, CaptureCompletion, CaptureType, DeepAnalysis, ProcessingStatus,
    };
    use storage::InMemoryStore;

    #[test]
    fn test_keywords_filter_stop_words_and_short_tokens() {
        let words = keywords("The Rust book: an intro to ownership, by Steve & Carol");
        assert!(words.contains("rust"));
        assert!(words.contains("ownership"));
        assert!(!words.contains("the"));
        assert!(!words.contains("to"));
        assert!(!words.contains("an"));
        assert!(!words.contains("by"));
    }

    #[test]
    fn test_jaccard() {
        let a = keywords("rust async runtime");
        let b = keywords("rust runtime internals");
        assert!((jaccard(&a, &b) - 0.5).abs() < f32::EPSILON);
        assert_eq!(jaccard(&a, &HashSet::new()), 0.0);
    }

    async fn completed(store: &InMemoryStore, owner: &OwnerId, title: &str, topics: &[&str]) {
        let capture = Capture::new(owner.clone(), CaptureType::Link, "https://example.com");
        store.insert_capture(&capture).await.unwrap();
        store
            .set_status(&capture.id, ProcessingStatus::Processing)
            .await
            .unwrap();
        let completion = CaptureCompletion {
            analysis: DeepAnalysis {
                title: title.to_string(),
                ..Default::default()
            }
            .with_topics(topics.iter().copied()),
            plan: ActionPlan {
                capture_id: capture.id.clone(),
                actions: vec![],
                confidence: 0.9,
                reasoning: String::new(),
            },
            results: vec![],
            reasoning: vec![],
        };
        store.complete_capture(&capture.id, &completion).await.unwrap();
    }

    #[tokio::test]
    async fn test_search_ranks_by_overlap() {
        let store = Arc::new(InMemoryStore::new());
        let owner = OwnerId::new("owner-1".to_string()).unwrap();
        completed(&store, &owner, "Async Rust runtime", &["rust", "async"]).await;
        completed(&store, &owner, "Rust ownership guide", &["rust"]).await;
        completed(&store, &owner, "Sourdough baking", &["cooking"]).await;

        let memory = StoreSemanticMemory::new(store);
        let hits = memory.search("async rust", &owner, 3).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert!(hits[0].content.starts_with("Async Rust runtime"));
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_search_is_owner_scoped() {
        let store = Arc::new(InMemoryStore::new());
        let owner = OwnerId::new("owner-1".to_string()).unwrap();
        let other = OwnerId::new("owner-2".to_string()).unwrap();
        completed(&store, &other, "Rust ownership", &["rust"]).await;

        let memory = StoreSemanticMemory::new(store);
        assert!(memory.search("rust", &owner, 3).await.unwrap().is_empty());
    }
}
