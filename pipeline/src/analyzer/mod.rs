//! # Analyzer
//!
//! Turns a capture of any type into one canonical [`DeepAnalysis`], then
//! enriches it with context from semantic memory, a classified intent and
//! related captures.
//!
//! Every collaborator failure inside the analyzer is degraded, never fatal:
//! the branch that failed substitutes its documented default, records it in
//! the reasoning trail and the run continues.

mod extraction;
pub mod fallback;
pub mod intent;
pub mod link;
pub mod media;
pub mod text;

use crate::telemetry::PipelineTelemetry;
use config::AnalyzerConfig;
use stash_core::traits::{
    ContentExtractor, FrameSampler, LlmClient, PipelineStore, SemanticMemory, VisionClient,
};
use stash_core::types::{
    AnalyzerOutput, Capture, CaptureType, DeepAnalysis, ReasoningStep, RelatedCapture,
};
use serde_json::json;
use std::sync::Arc;

pub use link::{LinkKind, classify_link};

/// Result of one content branch. `degraded` names the collaborator whose
/// failure forced a default, if any.
#[derive(Debug, Clone)]
pub struct BranchOutcome {
    pub analysis: DeepAnalysis,
    pub method: &'static str,
    pub degraded: Option<String>,
}

impl BranchOutcome {
    pub fn ok(analysis: DeepAnalysis, method: &'static str) -> Self {
        Self {
            analysis,
            method,
            degraded: None,
        }
    }

    pub fn degraded(analysis: DeepAnalysis, method: &'static str, reason: String) -> Self {
        Self {
            analysis,
            method,
            degraded: Some(reason),
        }
    }
}

pub struct Analyzer {
    llm: Arc<dyn LlmClient>,
    extractor: Arc<dyn ContentExtractor>,
    vision: Arc<dyn VisionClient>,
    frames: Arc<dyn FrameSampler>,
    memory: Arc<dyn SemanticMemory>,
    store: Arc<dyn PipelineStore>,
    config: AnalyzerConfig,
    telemetry: PipelineTelemetry,
}

impl Analyzer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        extractor: Arc<dyn ContentExtractor>,
        vision: Arc<dyn VisionClient>,
        frames: Arc<dyn FrameSampler>,
        memory: Arc<dyn SemanticMemory>,
        store: Arc<dyn PipelineStore>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            llm,
            extractor,
            vision,
            frames,
            memory,
            store,
            config,
            telemetry: PipelineTelemetry::new(),
        }
    }

    #[tracing::instrument(skip(self, capture), fields(capture_id = %capture.id, capture_type = %capture.capture_type))]
    pub async fn analyze(&self, capture: &Capture) -> AnalyzerOutput {
        let mut reasoning = Vec::new();

        let outcome = self.analyze_content(capture).await;
        if let Some(reason) = &outcome.degraded {
            tracing::warn!(method = outcome.method, reason = %reason, "Degraded content analysis");
            self.telemetry.record_degraded(outcome.method);
        }
        reasoning.push(ReasoningStep::new(
            "analyze_content",
            format!("{} analysis via {}", capture.capture_type, outcome.method),
            json!({
                "title": outcome.analysis.title,
                "topics": outcome.analysis.topics,
                "degraded": outcome.degraded,
            }),
        ));
        let analysis = outcome.analysis;

        let context = self.retrieve_context(capture, &analysis).await;
        reasoning.push(ReasoningStep::new(
            "retrieve_context",
            if context.is_empty() {
                "no prior context".to_string()
            } else {
                format!("{} characters of prior context", context.chars().count())
            },
            json!({ "empty": context.is_empty() }),
        ));

        let intent = intent::classify(self.llm.as_ref(), capture, &analysis, &context).await;
        let intent = match intent {
            Ok(intent) => intent,
            Err(e) => {
                tracing::warn!(error = %e, "Intent classification failed, using generic intent");
                self.telemetry.record_degraded("intent");
                stash_core::types::UserIntent::generic()
            }
        };
        reasoning.push(ReasoningStep::new(
            "classify_intent",
            format!("{} ({} urgency)", intent.primary, intent.urgency),
            json!({ "confidence": intent.confidence, "category": intent.category }),
        ));

        let related = self.find_related(capture, &analysis).await;
        reasoning.push(ReasoningStep::new(
            "find_related",
            format!("{} related captures", related.len()),
            json!({ "topic": analysis.first_topic() }),
        ));

        let related_count = related.len();
        AnalyzerOutput {
            reasoning,
            analysis,
            context,
            intent,
            related,
            related_count,
        }
    }

    async fn analyze_content(&self, capture: &Capture) -> BranchOutcome {
        match capture.capture_type {
            CaptureType::Link => {
                link::analyze(
                    self.extractor.as_ref(),
                    self.llm.as_ref(),
                    capture,
                    &self.config,
                )
                .await
            }
            CaptureType::Text => text::analyze(self.llm.as_ref(), capture, &self.config).await,
            CaptureType::Image => {
                media::analyze_image(self.vision.as_ref(), capture, &self.config).await
            }
            CaptureType::Video => {
                media::analyze_video(
                    self.frames.as_ref(),
                    self.vision.as_ref(),
                    capture,
                    &self.config,
                )
                .await
            }
            CaptureType::Audio | CaptureType::Document | CaptureType::Other => {
                BranchOutcome::ok(fallback::minimal(capture, &self.config), "raw_content")
            }
        }
    }

    async fn retrieve_context(&self, capture: &Capture, analysis: &DeepAnalysis) -> String {
        let mut query = analysis.title.clone();
        for topic in &analysis.topics {
            query.push(' ');
            query.push_str(topic);
        }

        match self
            .memory
            .search(&query, &capture.owner_id, self.config.context_snippets)
            .await
        {
            Ok(snippets) => summarize_snippets(
                snippets.iter().map(|s| s.content.as_str()),
                self.config.context_snippets,
            ),
            Err(e) => {
                tracing::warn!(error = %e, "Semantic memory unavailable, continuing without context");
                self.telemetry.record_degraded("semantic_memory");
                String::new()
            }
        }
    }

    async fn find_related(&self, capture: &Capture, analysis: &DeepAnalysis) -> Vec<RelatedCapture> {
        let Some(topic) = analysis.first_topic() else {
            return Vec::new();
        };
        match self
            .store
            .find_related(
                &capture.owner_id,
                topic,
                &capture.id,
                self.config.related_limit,
            )
            .await
        {
            Ok(related) => related,
            Err(e) => {
                tracing::warn!(error = %e, topic, "Related capture lookup failed");
                self.telemetry.record_degraded("related");
                Vec::new()
            }
        }
    }
}

/// Bulleted digest of at most `limit` snippets.
pub fn summarize_snippets<'a>(snippets: impl Iterator<Item = &'a str>, limit: usize) -> String {
    snippets
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(limit)
        .map(|s| format!("- {}", truncate_chars(s, 300)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Reading time in minutes, at least one for non-empty content.
pub fn estimate_minutes(content: &str, words_per_minute: u32) -> u32 {
    let words = content.split_whitespace().count() as u32;
    if words == 0 {
        return 0;
    }
    words.div_ceil(words_per_minute.max(1)).max(1)
}
