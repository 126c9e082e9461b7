//! Link captures: classify the URL, extract its text, then run structured
//! extraction over it.

use super::{BranchOutcome, extraction, fallback, truncate_chars};
use config::AnalyzerConfig;
use stash_core::traits::{ContentExtractor, LlmClient};
use stash_core::types::{Capture, ExtractionKind};
use strum::Display;

const VIDEO_HOSTS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "tiktok.com",
    "instagram.com",
];

const DOCUMENT_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx", ".ppt", ".pptx", ".txt", ".md"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LinkKind {
    Video,
    Document,
    Article,
}

impl LinkKind {
    pub fn extraction_kind(self) -> ExtractionKind {
        match self {
            LinkKind::Video => ExtractionKind::Transcript,
            LinkKind::Document => ExtractionKind::Document,
            LinkKind::Article => ExtractionKind::Reader,
        }
    }

    fn method(self) -> &'static str {
        match self {
            LinkKind::Video => "transcript",
            LinkKind::Document => "document_text",
            LinkKind::Article => "reader",
        }
    }
}

/// Host (lowercased, without `www.`/`m.` or port) and path of a URL.
fn split_url(url: &str) -> (String, &str) {
    let rest = url
        .trim()
        .split_once("://")
        .map_or(url.trim(), |(_, rest)| rest);
    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let (authority, path) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    let host = authority
        .rsplit('@')
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .map_or_else(|| host.clone(), str::to_string);
    (host, path)
}

pub fn classify_link(url: &str) -> LinkKind {
    let (host, path) = split_url(url);
    let is_video_host = VIDEO_HOSTS
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{}", known)));
    if is_video_host {
        return LinkKind::Video;
    }

    let path = path.to_lowercase();
    if DOCUMENT_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return LinkKind::Document;
    }
    LinkKind::Article
}

pub async fn analyze(
    extractor: &dyn ContentExtractor,
    llm: &dyn LlmClient,
    capture: &Capture,
    config: &AnalyzerConfig,
) -> BranchOutcome {
    let url = capture.content.trim();
    let kind = classify_link(url);
    let content_type = kind.to_string();

    let text = match extractor.extract(url, kind.extraction_kind()).await {
        Ok(text) => text,
        Err(e) => {
            return BranchOutcome::degraded(
                fallback::degraded_link(url, &content_type),
                kind.method(),
                e.to_string(),
            );
        }
    };

    let prefix = truncate_chars(&text, config.text_prefix_chars);
    let body = match capture.annotation.as_deref() {
        Some(note) if !note.trim().is_empty() => {
            format!("URL: {}\nUser note: {}\n\n{}", url, note.trim(), prefix)
        }
        _ => format!("URL: {}\n\n{}", url, prefix),
    };

    match extraction::extract(llm, &capture.owner_id, &content_type, &body).await {
        Ok(response) => BranchOutcome::ok(
            response.into_analysis(text, &content_type, url.to_string(), config.words_per_minute),
            kind.method(),
        ),
        Err(e) => {
            let mut analysis = fallback::degraded_link(url, &content_type);
            analysis.description = truncate_chars(text.trim(), config.degraded_description_chars);
            analysis.estimated_minutes = super::estimate_minutes(&text, config.words_per_minute);
            analysis.content = text;
            BranchOutcome::degraded(analysis, kind.method(), e.to_string())
        }
    }
}
