//! Image and video captures, described by the vision model.

use super::extraction::{AnalysisResponse, vision_prompt};
use super::{BranchOutcome, fallback};
use config::AnalyzerConfig;
use stash_core::decode_structured;
use stash_core::traits::{FrameSampler, VisionClient};
use stash_core::types::{Capture, VisionImage};

/// `data:<mime>;base64,<payload>` becomes an inline image, anything else is
/// treated as a URL.
pub fn image_source(content: &str) -> VisionImage {
    let content = content.trim();
    if let Some(rest) = content.strip_prefix("data:")
        && let Some((header, payload)) = rest.split_once(',')
        && let Some(mime_type) = header.strip_suffix(";base64")
    {
        return VisionImage::Inline {
            mime_type: mime_type.to_string(),
            data_base64: payload.to_string(),
        };
    }
    VisionImage::Url {
        url: content.to_string(),
    }
}

fn with_annotation(prompt: String, capture: &Capture) -> String {
    match capture.annotation.as_deref().map(str::trim) {
        Some(note) if !note.is_empty() => format!("{} The user noted: \"{}\".", prompt, note),
        _ => prompt,
    }
}

async fn describe(
    vision: &dyn VisionClient,
    images: &[VisionImage],
    prompt: &str,
    capture: &Capture,
    config: &AnalyzerConfig,
    content_type: &str,
) -> BranchOutcome {
    let raw = match vision.describe(images, prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            return BranchOutcome::degraded(
                fallback::degraded_media(capture, "", config),
                "vision",
                e.to_string(),
            );
        }
    };

    match decode_structured::<AnalysisResponse>(&raw) {
        Ok(response) => {
            let fallback_title = fallback::degraded_media(capture, "", config).title;
            let mut analysis = response.into_analysis(
                capture.content.clone(),
                content_type,
                fallback_title,
                config.words_per_minute,
            );
            // Media has no reading time.
            analysis.estimated_minutes = 0;
            BranchOutcome::ok(analysis, "vision")
        }
        Err(e) => BranchOutcome::degraded(
            fallback::degraded_media(capture, &raw, config),
            "vision",
            e.to_string(),
        ),
    }
}

pub async fn analyze_image(
    vision: &dyn VisionClient,
    capture: &Capture,
    config: &AnalyzerConfig,
) -> BranchOutcome {
    let prompt = with_annotation(vision_prompt("Describe this image."), capture);
    let images = [image_source(&capture.content)];
    describe(vision, &images, &prompt, capture, config, "image").await
}

pub async fn analyze_video(
    frames: &dyn FrameSampler,
    vision: &dyn VisionClient,
    capture: &Capture,
    config: &AnalyzerConfig,
) -> BranchOutcome {
    let sampled = match frames
        .sample_frames(capture.content.trim(), config.video_frames)
        .await
    {
        Ok(sampled) if !sampled.is_empty() => sampled,
        Ok(_) => {
            return BranchOutcome::degraded(
                fallback::degraded_media(capture, "", config),
                "frame_sampler",
                "no frames sampled".to_string(),
            );
        }
        Err(e) => {
            return BranchOutcome::degraded(
                fallback::degraded_media(capture, "", config),
                "frame_sampler",
                e.to_string(),
            );
        }
    };

    let subject = format!(
        "These {} images are frames sampled in order from one video. Describe the video as a whole.",
        sampled.len()
    );
    let prompt = with_annotation(vision_prompt(&subject), capture);
    describe(vision, &sampled, &prompt, capture, config, "video").await
}
