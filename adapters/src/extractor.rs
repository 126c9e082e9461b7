//! HTTP content extraction for links.
//!
//! Generic pages and documents go through a reader endpoint that returns
//! readable text for any URL appended to it. Videos hosted on YouTube are
//! fetched as timed-text captions and cleaned into a plain transcript;
//! other video hosts fall back to the reader.

use crate::http;
use async_trait::async_trait;
use errors::CollaboratorError;
use regex::Regex;
use stash_core::traits::ContentExtractor;
use stash_core::types::ExtractionKind;
use std::sync::LazyLock;
use std::time::Duration;

const SERVICE: &str = "content_extraction";

static YOUTUBE_ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:youtube\.com/watch\?(?:[^#]*&)?v=)([A-Za-z0-9_-]{11})",
        r"youtu\.be/([A-Za-z0-9_-]{11})",
        r"youtube\.com/(?:embed|shorts|live|v)/([A-Za-z0-9_-]{11})",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static CUE_TIMING: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\d{1,2}:\d{2}(?::\d{2})?[.,]\d{3}\s+-->\s+\d{1,2}:\d{2}(?::\d{2})?[.,]\d{3}").ok()
});

static MARKUP: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());

/// YouTube video id for watch, short-link, embed and shorts URLs.
pub fn youtube_video_id(url: &str) -> Option<String> {
    YOUTUBE_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Turns caption markup (timed-text XML, WebVTT or SRT) into plain text.
///
/// Cue numbers, timings and tags are dropped, common entities decoded and
/// consecutive duplicate lines collapsed.
pub fn clean_subtitles(raw: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty()
            || line == "WEBVTT"
            || line.starts_with("Kind:")
            || line.starts_with("Language:")
            || line.starts_with("NOTE")
            || line.chars().all(|c| c.is_ascii_digit())
        {
            continue;
        }
        if CUE_TIMING.as_ref().is_some_and(|re| re.is_match(line)) {
            continue;
        }

        let without_tags = match MARKUP.as_ref() {
            Some(re) => re.replace_all(line, " ").into_owned(),
            None => line.to_string(),
        };
        let text = decode_entities(&without_tags)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        if text.is_empty() || lines.last() == Some(&text) {
            continue;
        }
        lines.push(text);
    }

    lines.join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;#39;", "'")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

pub struct HttpContentExtractor {
    client: reqwest::Client,
    reader_endpoint: String,
    transcript_endpoint: String,
    min_content_length: usize,
    timeout: Duration,
}

impl HttpContentExtractor {
    pub fn new(reader_endpoint: &str, transcript_endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            reader_endpoint: reader_endpoint.to_string(),
            transcript_endpoint: transcript_endpoint.to_string(),
            min_content_length: 100,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &config::CollaboratorConfig) -> Self {
        Self::new(&config.reader_endpoint, &config.transcript_endpoint)
            .with_min_content_length(config.min_content_length)
            .with_timeout(Duration::from_millis(config.timeout_ms))
    }

    pub fn with_min_content_length(mut self, min_content_length: usize) -> Self {
        self.min_content_length = min_content_length;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch_text(&self, request: reqwest::RequestBuilder) -> Result<String, CollaboratorError> {
        let response = http::send(SERVICE, request, self.timeout).await?;
        response
            .text()
            .await
            .map_err(|e| http::transport_error(SERVICE, self.timeout, e))
    }

    async fn read(&self, url: &str) -> Result<String, CollaboratorError> {
        let endpoint = format!("{}{}", self.reader_endpoint, url);
        self.fetch_text(
            self.client
                .get(&endpoint)
                .header(reqwest::header::ACCEPT, "text/plain"),
        )
        .await
    }

    async fn transcript(&self, url: &str) -> Result<String, CollaboratorError> {
        let Some(video_id) = youtube_video_id(url) else {
            tracing::debug!(url, "No YouTube id, reading video page instead");
            return self.read(url).await;
        };

        let endpoint = format!(
            "{}?v={}&lang=en&fmt=vtt",
            self.transcript_endpoint,
            urlencoding::encode(&video_id)
        );
        let raw = self.fetch_text(self.client.get(&endpoint)).await?;
        Ok(clean_subtitles(&raw))
    }
}

#[async_trait]
impl ContentExtractor for HttpContentExtractor {
    #[tracing::instrument(skip(self), fields(kind = %kind))]
    async fn extract(&self, url: &str, kind: ExtractionKind) -> Result<String, CollaboratorError> {
        let text = match kind {
            ExtractionKind::Reader | ExtractionKind::Document => self.read(url).await?,
            ExtractionKind::Transcript => self.transcript(url).await?,
        };

        let text = text.trim().to_string();
        let length = text.chars().count();
        if length < self.min_content_length {
            return Err(CollaboratorError::ContentTooShort {
                length,
                min: self.min_content_length,
            });
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_video_id_variants() {
        let cases = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?t=42",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
        ];
        for url in cases {
            assert_eq!(
                youtube_video_id(url).as_deref(),
                Some("dQw4w9WgXcQ"),
                "failed for {}",
                url
            );
        }
        assert_eq!(youtube_video_id("https://vimeo.com/123456"), None);
    }

    #[test]
    fn test_clean_webvtt() {
        let raw = "WEBVTT\nKind: captions\nLanguage: en\n\n1\n00:00:01.000 --> 00:00:03.000\n<c>Hello</c> &amp; welcome\n\n2\n00:00:03.000 --> 00:00:05.000\nHello &amp; welcome\n\n3\n00:00:05.000 --> 00:00:07.000\nit&#39;s Rust time\n";
        assert_eq!(clean_subtitles(raw), "Hello & welcome it's Rust time");
    }

    #[test]
    fn test_clean_timed_text_xml() {
        let raw = r#"<?xml version="1.0"?><transcript><text start="0" dur="1">first line</text>
<text start="1" dur="1">second &quot;line&quot;</text></transcript>"#;
        assert_eq!(clean_subtitles(raw), "first line second \"line\"");
    }
}
