//! Completion provider trait and the config-driven factory

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{LlmConfig, LlmProviderKind};
use crate::error::Result;

use super::ollama::OllamaLlm;
use super::openai::OpenAiCompatibleLlm;

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Sampling parameters for one completion
#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&LlmConfig> for CompletionOptions {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Trait for chat completion
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama chat API
/// - `OpenAiCompatibleLlm`: OpenAI or Groq chat completions
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete a conversation, returning the assistant reply text
    async fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions)
        -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}

/// Build the completion provider selected by `config.provider`
pub fn build_completion_provider(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>> {
    let provider: Arc<dyn CompletionProvider> = match config.provider {
        LlmProviderKind::Ollama => Arc::new(OllamaLlm::new(config)?),
        LlmProviderKind::OpenAi => Arc::new(OpenAiCompatibleLlm::openai(config)?),
        LlmProviderKind::Groq => Arc::new(OpenAiCompatibleLlm::groq(config)?),
    };
    tracing::info!(
        "Completion provider: {} (model {})",
        provider.name(),
        provider.model()
    );
    Ok(provider)
}
