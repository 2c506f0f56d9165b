use crate::error::TutorError;
use crate::retry::RetryPolicy;
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use std::sync::Arc;

/// A single prompt for a chat-completion model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

/// A generic client for interacting with an LLM.
///
/// All "intelligence" of the tutor goes through this one capability, so the
/// rest of the system can run against a deterministic stand-in.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes a single, non-streaming completion call and returns the text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, TutorError>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The specific model identifier to use for chat completions (e.g., "gpt-4o-mini").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

fn provider_error(err: OpenAIError) -> TutorError {
    match err {
        OpenAIError::Reqwest(e) => TutorError::transient(format!("LLM transport error: {e}")),
        OpenAIError::ApiError(e) => TutorError::upstream(format!("LLM provider error: {e}")),
        other => TutorError::upstream(format!("LLM request failed: {other}")),
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, TutorError> {
        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(request.temperature)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(request.system)
                    .build()
                    .map_err(provider_error)?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(request.user)
                    .build()
                    .map_err(provider_error)?
                    .into(),
            ])
            .build()
            .map_err(provider_error)?;

        let response: CreateChatCompletionResponse = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(provider_error)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TutorError::Inference("LLM response had no text content".to_string()))
    }
}

/// Wraps another client and retries transient failures under a [`RetryPolicy`].
pub struct RetryingLLMClient {
    inner: Arc<dyn LLMClient>,
    policy: RetryPolicy,
}

impl RetryingLLMClient {
    pub fn new(inner: Arc<dyn LLMClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LLMClient for RetryingLLMClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, TutorError> {
        self.policy
            .run("llm_completion", || self.inner.complete(request.clone()))
            .await
    }
}
