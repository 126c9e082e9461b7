use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::types::responses::ResponseFormat;
use async_trait::async_trait;
use errors::CollaboratorError;
use stash_core::traits::{LlmClient, Summarizer};
use stash_core::types::{ChatMessage, ChatRequest, ChatRole, OwnerId};
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "llm";

pub(crate) fn openai_client(
    api_key: Option<&str>,
    base_url: Option<&str>,
) -> async_openai::Client<async_openai::config::OpenAIConfig> {
    let mut config = async_openai::config::OpenAIConfig::new();
    if let Some(api_key) = api_key {
        config = config.with_api_key(api_key);
    }
    if let Some(base_url) = base_url {
        config = config.with_api_base(base_url);
    }
    async_openai::Client::with_config(config)
}

pub(crate) fn openai_error(service: &str, e: async_openai::error::OpenAIError) -> CollaboratorError {
    CollaboratorError::Transport {
        service: service.to_string(),
        reason: e.to_string(),
    }
}

fn to_openai_message(
    message: &ChatMessage,
) -> Result<ChatCompletionRequestMessage, async_openai::error::OpenAIError> {
    Ok(match message.role {
        ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content.as_str())
            .build()?
            .into(),
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.as_str())
            .build()?
            .into(),
        ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.content.as_str())
            .build()?
            .into(),
    })
}

/// Chat completion over any OpenAI-compatible endpoint.
pub struct OpenAiLlmClient {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiLlmClient {
    pub fn new(api_key: Option<&str>, base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self {
            client: openai_client(api_key, base_url),
            model: model.into(),
            max_tokens: 1024,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(llm: &config::LlmConfig, collaborators: &config::CollaboratorConfig) -> Self {
        Self::new(llm.api_key.as_deref(), llm.base_url.as_deref(), llm.model.clone())
            .with_max_tokens(llm.max_tokens)
            .with_timeout(Duration::from_millis(collaborators.timeout_ms))
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn create(&self, request: &ChatRequest) -> Result<String, CollaboratorError> {
        let messages = request
            .messages
            .iter()
            .map(to_openai_message)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| openai_error(SERVICE, e))?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(request.model.as_deref().unwrap_or(&self.model))
            .messages(messages)
            .temperature(request.temperature)
            .max_completion_tokens(request.max_tokens.unwrap_or(self.max_tokens));
        if request.json_mode {
            builder.response_format(ResponseFormat::JsonObject);
        }
        let openai_request = builder.build().map_err(|e| openai_error(SERVICE, e))?;

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| openai_error(SERVICE, e))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| CollaboratorError::Rejected {
                service: SERVICE.to_string(),
                reason: "empty completion".to_string(),
            })
    }
}

#[async_trait]
impl LlmClient for OpenAiLlmClient {
    #[tracing::instrument(skip(self, request), fields(owner_id = %owner_id, model = ?request.model))]
    async fn complete(
        &self,
        request: &ChatRequest,
        owner_id: &OwnerId,
    ) -> Result<String, CollaboratorError> {
        match tokio::time::timeout(self.timeout, self.create(request)).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout {
                service: SERVICE.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}

/// Summarizes through the chat model, bounded to `max_length` characters.
pub struct LlmSummarizer {
    llm: Arc<dyn LlmClient>,
}

impl LlmSummarizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(
        &self,
        content: &str,
        max_length: usize,
        owner_id: &OwnerId,
    ) -> Result<String, CollaboratorError> {
        let request = ChatRequest::new(vec![
            ChatMessage::system(format!(
                "Summarize the user's content in plain prose. Use at most {} characters. \
                 Reply with the summary only.",
                max_length
            )),
            ChatMessage::user(content),
        ]);

        let summary = self.llm.complete(&request, owner_id).await?;
        Ok(truncate_chars(summary.trim(), max_length))
    }
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLlm;

    #[tokio::test]
    async fn test_summary_is_bounded() {
        let llm = Arc::new(MockLlm::new());
        llm.set_default_response(&"word ".repeat(200)).await;
        let summarizer = LlmSummarizer::new(llm.clone());

        let owner = OwnerId::new("owner-1".to_string()).unwrap();
        let summary = summarizer.summarize("long text", 50, &owner).await.unwrap();
        assert!(summary.chars().count() <= 50);

        let request = llm.requests().await.pop().unwrap();
        assert!(request.messages[0].content.contains("50 characters"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn test_roles_convert() {
        for message in [
            ChatMessage::system("s"),
            ChatMessage::user("u"),
            ChatMessage {
                role: ChatRole::Assistant,
                content: "a".to_string(),
            },
        ] {
            assert!(to_openai_message(&message).is_ok());
        }
    }
}
