use super::{BranchOutcome, extraction, fallback, truncate_chars};
use config::AnalyzerConfig;
use stash_core::traits::LlmClient;
use stash_core::types::Capture;

pub async fn analyze(llm: &dyn LlmClient, capture: &Capture, config: &AnalyzerConfig) -> BranchOutcome {
    let minimal = fallback::minimal(capture, config);
    let prefix = truncate_chars(&capture.content, config.text_prefix_chars);

    match extraction::extract(llm, &capture.owner_id, "note", &prefix).await {
        Ok(response) => BranchOutcome::ok(
            response.into_analysis(
                capture.content.clone(),
                "text",
                minimal.title,
                config.words_per_minute,
            ),
            "llm_extraction",
        ),
        Err(e) => BranchOutcome::degraded(minimal, "llm_extraction", e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adapters::mock::MockLlm;
    use stash_core::types::{CaptureType, OwnerId};

    fn note(content: &str) -> Capture {
        Capture::new(OwnerId::new("u1".to_string()).unwrap(), CaptureType::Text, content)
    }

    #[tokio::test]
    async fn test_prefix_is_bounded() {
        let llm = MockLlm::new();
        llm.set_default_response(r#"{"title": "Long note"}"#).await;
        let config = AnalyzerConfig {
            text_prefix_chars: 100,
            ..AnalyzerConfig::default()
        };

        let outcome = analyze(&llm, &note(&"x".repeat(5_000)), &config).await;
        assert_eq!(outcome.analysis.title, "Long note");
        assert_eq!(outcome.analysis.content.len(), 5_000);

        let requests = llm.requests().await;
        let user = &requests[0].messages[1].content;
        assert!(user.chars().filter(|c| *c == 'x').count() <= 100);
    }

    #[tokio::test]
    async fn test_llm_failure_uses_minimal_analysis() {
        let llm = MockLlm::new();
        llm.fail_all().await;

        let outcome = analyze(&llm, &note("Buy milk tomorrow at 5pm"), &AnalyzerConfig::default()).await;
        assert!(outcome.degraded.is_some());
        assert_eq!(outcome.analysis.title, "Buy milk tomorrow at 5pm");
        assert_eq!(outcome.analysis.content_type, "text");
        assert!(outcome.analysis.topics.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_reply_uses_minimal_analysis() {
        let llm = MockLlm::new();
        llm.set_default_response("I cannot help with that").await;

        let outcome = analyze(&llm, &note("Call the dentist"), &AnalyzerConfig::default()).await;
        assert!(outcome.degraded.is_some());
        assert_eq!(outcome.analysis.title, "Call the dentist");
    }
}
