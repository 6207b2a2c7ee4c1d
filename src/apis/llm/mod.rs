/// LLM provider module
///
/// One unified client trait over chat-completion providers with tool calling.
/// The shipped implementation speaks the OpenAI wire format, which also
/// covers OpenRouter/DeepSeek/compatible gateways via `OPENAI_BASE_URL`.
pub mod openai;
pub mod types;

pub use openai::OpenAiClient;
pub use types::{
    ChatMessage, ChatRequest, ChatResponse, MessageRole, ToolCallRequest, ToolSpec, Usage,
};

use crate::config::Credentials;
use crate::errors::LlmError;
use async_trait::async_trait;
use std::sync::Arc;

/// Unified interface for chat-completion providers
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name for logging
    fn provider(&self) -> &'static str;

    /// Model identifier requests are issued against
    fn model(&self) -> &str;

    /// Make a chat completion request
    async fn call(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}

/// Build the configured client from credentials
pub fn build_client(credentials: &Credentials) -> Result<Arc<dyn LlmClient>, LlmError> {
    let api_key = credentials
        .llm_api_key
        .clone()
        .ok_or(LlmError::NotConfigured {
            provider: "openai".to_string(),
        })?;

    Ok(Arc::new(OpenAiClient::new(
        api_key,
        credentials.llm_base_url.clone(),
        credentials.llm_model.clone(),
    )))
}
