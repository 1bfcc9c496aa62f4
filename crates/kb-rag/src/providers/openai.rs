//! OpenAI-compatible chat completions (OpenAI, Groq)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::llm::{ChatMessage, CompletionOptions, CompletionProvider};
use super::retry::retry_request;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any `/chat/completions` endpoint speaking the OpenAI wire format
pub struct OpenAiCompatibleLlm {
    client: Client,
    name: &'static str,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_retries: u32,
}

impl OpenAiCompatibleLlm {
    /// OpenAI, using `openai_*` settings
    pub fn openai(config: &LlmConfig) -> Result<Self> {
        Self::new(
            "openai",
            config,
            &config.openai_base_url,
            config.openai_api_key.clone(),
            &config.openai_model,
        )
    }

    /// Groq, using `groq_*` settings
    pub fn groq(config: &LlmConfig) -> Result<Self> {
        Self::new(
            "groq",
            config,
            &config.groq_base_url,
            config.groq_api_key.clone(),
            &config.groq_model,
        )
    }

    fn new(
        name: &'static str,
        config: &LlmConfig,
        base_url: &str,
        api_key: Option<String>,
        model: &str,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            name,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.to_string(),
            max_retries: config.max_retries,
        })
    }

    async fn complete_once(
        &self,
        api_key: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::llm(format!("{} request failed: {}", self.name, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::llm(format!("{} error {}: {}", self.name, status, body)));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::llm(format!("Failed to parse {} response: {}", self.name, e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::llm(format!("{} returned no choices", self.name)))
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatibleLlm {
    async fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            Error::llm(format!("{}_API_KEY is not set", self.name.to_uppercase()))
        })?;
        retry_request(self.name, self.max_retries, || {
            self.complete_once(api_key, messages, options)
        })
        .await
    }

    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        &self.model
    }
}
