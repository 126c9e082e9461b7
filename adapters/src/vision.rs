use crate::http;
use crate::llm::{openai_client, openai_error};
use async_openai::types::chat::{
    ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
    ImageUrlArgs,
};
use async_trait::async_trait;
use errors::CollaboratorError;
use serde::Deserialize;
use stash_core::traits::{FrameSampler, VisionClient};
use stash_core::types::VisionImage;
use std::time::Duration;

const VISION_SERVICE: &str = "vision";
const FRAME_SERVICE: &str = "frame_sampler";

/// Vision model over an OpenAI-compatible chat endpoint. All images go
/// into one user message after the prompt.
pub struct OpenAiVisionClient {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiVisionClient {
    pub fn new(api_key: Option<&str>, base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self {
            client: openai_client(api_key, base_url),
            model: model.into(),
            max_tokens: 1024,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(llm: &config::LlmConfig, collaborators: &config::CollaboratorConfig) -> Self {
        let mut client = Self::new(
            llm.api_key.as_deref(),
            llm.base_url.as_deref(),
            llm.vision_model.clone(),
        );
        client.max_tokens = llm.max_tokens;
        client.timeout = Duration::from_millis(collaborators.timeout_ms);
        client
    }

    async fn create(&self, images: &[VisionImage], prompt: &str) -> Result<String, CollaboratorError> {
        let mut parts: Vec<ChatCompletionRequestUserMessageContentPart> =
            Vec::with_capacity(images.len() + 1);
        parts.push(
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(prompt)
                .build()
                .map_err(|e| openai_error(VISION_SERVICE, e))?
                .into(),
        );
        for image in images {
            let image_url = ImageUrlArgs::default()
                .url(image.as_image_url())
                .detail(ImageDetail::Auto)
                .build()
                .map_err(|e| openai_error(VISION_SERVICE, e))?;
            parts.push(
                ChatCompletionRequestMessageContentPartImageArgs::default()
                    .image_url(image_url)
                    .build()
                    .map_err(|e| openai_error(VISION_SERVICE, e))?
                    .into(),
            );
        }

        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(parts)
            .build()
            .map_err(|e| openai_error(VISION_SERVICE, e))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([message.into()])
            .max_completion_tokens(self.max_tokens)
            .build()
            .map_err(|e| openai_error(VISION_SERVICE, e))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| openai_error(VISION_SERVICE, e))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| CollaboratorError::Rejected {
                service: VISION_SERVICE.to_string(),
                reason: "empty completion".to_string(),
            })
    }
}

#[async_trait]
impl VisionClient for OpenAiVisionClient {
    #[tracing::instrument(skip(self, images, prompt), fields(images = images.len()))]
    async fn describe(
        &self,
        images: &[VisionImage],
        prompt: &str,
    ) -> Result<String, CollaboratorError> {
        if images.is_empty() {
            return Err(CollaboratorError::Rejected {
                service: VISION_SERVICE.to_string(),
                reason: "no images supplied".to_string(),
            });
        }
        match tokio::time::timeout(self.timeout, self.create(images, prompt)).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout {
                service: VISION_SERVICE.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FrameResponse {
    frames: Vec<String>,
}

/// Frame sampling service: `POST {endpoint}` with `{"video": ref, "count": n}`
/// answers `{"frames": [url, ...]}`.
pub struct HttpFrameSampler {
    client: reqwest::Client,
    endpoint: Option<String>,
    timeout: Duration,
}

impl HttpFrameSampler {
    pub fn new(endpoint: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            timeout,
        }
    }

    pub fn from_config(config: &config::CollaboratorConfig) -> Self {
        Self::new(
            config.frame_endpoint.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }
}

#[async_trait]
impl FrameSampler for HttpFrameSampler {
    async fn sample_frames(
        &self,
        video_ref: &str,
        count: usize,
    ) -> Result<Vec<VisionImage>, CollaboratorError> {
        let Some(endpoint) = &self.endpoint else {
            return Err(CollaboratorError::NotConfigured {
                service: FRAME_SERVICE.to_string(),
            });
        };

        let body = serde_json::json!({ "video": video_ref, "count": count });
        let response = http::send(
            FRAME_SERVICE,
            self.client.post(endpoint).json(&body),
            self.timeout,
        )
        .await?;
        let frames: FrameResponse = http::read_json(FRAME_SERVICE, self.timeout, response).await?;

        Ok(frames
            .frames
            .into_iter()
            .take(count)
            .map(|url| VisionImage::Url { url })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_frame_sampler_caps_frame_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/frames"))
            .and(body_partial_json(serde_json::json!({"video": "videos/a.mp4"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "frames": ["https://cdn/1.jpg", "https://cdn/2.jpg", "https://cdn/3.jpg"]
            })))
            .mount(&server)
            .await;

        let sampler = HttpFrameSampler::new(
            Some(format!("{}/frames", server.uri())),
            Duration::from_secs(5),
        );
        let frames = sampler.sample_frames("videos/a.mp4", 2).await.unwrap();
        assert_eq!(
            frames,
            vec![
                VisionImage::Url {
                    url: "https://cdn/1.jpg".to_string()
                },
                VisionImage::Url {
                    url: "https://cdn/2.jpg".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_frame_sampler_without_endpoint() {
        let sampler = HttpFrameSampler::new(None, Duration::from_secs(5));
        let err = sampler.sample_frames("videos/a.mp4", 4).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn test_vision_rejects_empty_image_list() {
        let client = OpenAiVisionClient::new(Some("sk-test"), Some("http://127.0.0.1:9"), "gpt-4o-mini");
        let err = client.describe(&[], "describe").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Rejected { .. }));
    }
}
