//! HTTP adapter behaviour against wiremock servers.

use adapters::{HttpCalendarClient, HttpContentExtractor};
use chrono::{Duration as ChronoDuration, Utc};
use errors::CollaboratorError;
use stash_core::traits::{CalendarClient, ContentExtractor};
use stash_core::types::{CalendarEventRequest, ExtractionKind, OwnerId};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn long_text() -> String {
    "Rust is a systems programming language focused on safety. ".repeat(5)
}

fn extractor(server: &MockServer) -> HttpContentExtractor {
    HttpContentExtractor::new(
        &format!("{}/reader/", server.uri()),
        &format!("{}/timedtext", server.uri()),
    )
    .with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_reader_extraction() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reader/https://example.com/article"))
        .respond_with(ResponseTemplate::new(200).set_body_string(long_text()))
        .mount(&server)
        .await;

    let text = extractor(&server)
        .extract("https://example.com/article", ExtractionKind::Reader)
        .await
        .unwrap();
    assert!(text.starts_with("Rust is a systems programming language"));
}

#[tokio::test]
async fn test_reader_server_error_is_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = extractor(&server)
        .extract("https://example.com/broken", ExtractionKind::Reader)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CollaboratorError::Status {
            service: "content_extraction".to_string(),
            status: 500
        }
    );
}

#[tokio::test]
async fn test_short_content_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  tiny  "))
        .mount(&server)
        .await;

    let err = extractor(&server)
        .extract("https://example.com/tiny", ExtractionKind::Document)
        .await
        .unwrap_err();
    assert_eq!(err, CollaboratorError::ContentTooShort { length: 4, min: 100 });
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let err = extractor(&server)
        .extract("https://example.com/busy", ExtractionKind::Reader)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CollaboratorError::RateLimited {
            service: "content_extraction".to_string(),
            retry_after: 7
        }
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_youtube_transcript_is_cleaned() {
    let server = MockServer::start().await;
    let vtt = format!(
        "WEBVTT\n\n00:00:00.000 --> 00:00:02.000\n<c>{}</c>\n",
        long_text()
    );
    Mock::given(method("GET"))
        .and(path("/timedtext"))
        .and(query_param("v", "dQw4w9WgXcQ"))
        .respond_with(ResponseTemplate::new(200).set_body_string(vtt))
        .mount(&server)
        .await;

    let text = extractor(&server)
        .extract(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            ExtractionKind::Transcript,
        )
        .await
        .unwrap();
    assert!(!text.contains("-->"));
    assert!(!text.contains("<c>"));
    assert!(text.starts_with("Rust is a systems programming language"));
}

#[tokio::test]
async fn test_non_youtube_video_falls_back_to_reader() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reader/https://vimeo.com/123456"))
        .respond_with(ResponseTemplate::new(200).set_body_string(long_text()))
        .mount(&server)
        .await;

    let text = extractor(&server)
        .extract("https://vimeo.com/123456", ExtractionKind::Transcript)
        .await
        .unwrap();
    assert!(text.contains("safety"));
}

#[tokio::test]
async fn test_calendar_create_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/owners/owner-1/events"))
        .and(header("authorization", "Bearer cal-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "id": "evt-42",
            "link": "https://calendar.example/evt-42"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpCalendarClient::new(
        Some(server.uri()),
        Some("cal-token".to_string()),
        Duration::from_secs(5),
    );
    let start = Utc::now() + ChronoDuration::days(1);
    let event = client
        .create_event(
            &OwnerId::new("owner-1".to_string()).unwrap(),
            &CalendarEventRequest {
                title: "Review capture".to_string(),
                description: None,
                start,
                end: start + ChronoDuration::hours(1),
                location: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(event.id, "evt-42");
    assert_eq!(event.link.as_deref(), Some("https://calendar.example/evt-42"));
}

#[tokio::test]
async fn test_calendar_without_endpoint_is_not_configured() {
    let client = HttpCalendarClient::new(None, None, Duration::from_secs(5));
    let err = client
        .delete_event(&OwnerId::new("owner-1".to_string()).unwrap(), "evt-1")
        .await
        .unwrap_err();
    assert!(matches!(err, CollaboratorError::NotConfigured { .. }));
}
