//! Analyses built without any collaborator.

use super::{estimate_minutes, truncate_chars};
use config::AnalyzerConfig;
use stash_core::types::{Capture, DeepAnalysis};

/// Minimal analysis from raw content: the first characters become title
/// and description, structured fields stay empty.
pub fn minimal(capture: &Capture, config: &AnalyzerConfig) -> DeepAnalysis {
    let raw = capture.content.trim();
    let title = first_line(raw, config.fallback_title_chars);
    DeepAnalysis {
        title: if title.is_empty() {
            capture.capture_type.to_string()
        } else {
            title
        },
        description: truncate_chars(raw, config.fallback_description_chars),
        content: capture.content.clone(),
        content_type: capture.capture_type.to_string(),
        estimated_minutes: estimate_minutes(raw, config.words_per_minute),
        ..DeepAnalysis::default()
    }
}

/// Analysis for a link whose content could not be fetched: the URL is the
/// title and nothing else is known.
pub fn degraded_link(url: &str, content_type: &str) -> DeepAnalysis {
    DeepAnalysis {
        title: url.to_string(),
        content: url.to_string(),
        content_type: content_type.to_string(),
        ..DeepAnalysis::default()
    }
}

/// Analysis for media whose model output could not be decoded. The raw
/// model text, truncated, becomes the description.
pub fn degraded_media(
    capture: &Capture,
    model_text: &str,
    config: &AnalyzerConfig,
) -> DeepAnalysis {
    let title = match capture.annotation.as_deref().map(str::trim) {
        Some(annotation) if !annotation.is_empty() => {
            truncate_chars(annotation, config.fallback_title_chars)
        }
        _ => format!("{} capture", capture.capture_type),
    };
    DeepAnalysis {
        title,
        description: truncate_chars(model_text.trim(), config.degraded_description_chars),
        content: capture.content.clone(),
        content_type: capture.capture_type.to_string(),
        ..DeepAnalysis::default()
    }
}

fn first_line(text: &str, max_chars: usize) -> String {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    truncate_chars(line, max_chars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stash_core::types::{CaptureType, OwnerId};

    fn capture(capture_type: CaptureType, content: &str) -> Capture {
        Capture::new(OwnerId::new("u1".to_string()).unwrap(), capture_type, content)
    }

    #[test]
    fn test_minimal_slices_raw_content() {
        let config = AnalyzerConfig {
            fallback_title_chars: 10,
            fallback_description_chars: 20,
            ..AnalyzerConfig::default()
        };
        let analysis = minimal(
            &capture(CaptureType::Audio, "Quarterly planning call notes\nsecond line"),
            &config,
        );
        assert_eq!(analysis.title, "Quarterly ");
        assert_eq!(analysis.description, "Quarterly planning c");
        assert_eq!(analysis.content_type, "audio");
        assert!(analysis.topics.is_empty());
        assert!(analysis.entities.is_empty());
    }

    #[test]
    fn test_minimal_blank_content_still_has_title() {
        let analysis = minimal(&capture(CaptureType::Other, "   "), &AnalyzerConfig::default());
        assert_eq!(analysis.title, "other");
        assert_eq!(analysis.estimated_minutes, 0);
    }

    #[test]
    fn test_degraded_link_uses_url() {
        let analysis = degraded_link("https://example.com/x", "article");
        assert_eq!(analysis.title, "https://example.com/x");
        assert!(analysis.topics.is_empty());
        assert!(analysis.description.is_empty());
    }

    #[test]
    fn test_degraded_media_truncates_model_text() {
        let config = AnalyzerConfig {
            degraded_description_chars: 12,
            ..AnalyzerConfig::default()
        };
        let analysis = degraded_media(
            &capture(CaptureType::Image, "https://cdn.example.com/a.png").with_annotation("Whiteboard"),
            "A whiteboard covered in diagrams",
            &config,
        );
        assert_eq!(analysis.title, "Whiteboard");
        assert_eq!(analysis.description, "A whiteboard");
    }
}
