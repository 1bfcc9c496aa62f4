//! Retrieval-grounded answering with citations

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::Result;
use crate::providers::llm::{CompletionOptions, CompletionProvider};
use crate::retrieval::Retriever;
use crate::types::QueryResponse;

use super::prompt::PromptBuilder;

/// Retrieve, prompt, complete
pub struct AnswerComposer {
    retriever: Retriever,
    llm: Arc<dyn CompletionProvider>,
    options: CompletionOptions,
}

impl AnswerComposer {
    pub fn new(retriever: Retriever, llm: Arc<dyn CompletionProvider>, options: CompletionOptions) -> Self {
        Self {
            retriever,
            llm,
            options,
        }
    }

    pub fn from_config(retriever: Retriever, llm: Arc<dyn CompletionProvider>, config: &LlmConfig) -> Self {
        Self::new(retriever, llm, CompletionOptions::from(config))
    }

    /// Answer `question` from the top_k chunks; citations follow retrieval order
    pub async fn answer(&self, question: &str) -> Result<QueryResponse> {
        let contexts = self.retriever.retrieve(question, None).await?;
        let messages = PromptBuilder::build_messages(question, &contexts);

        tracing::info!(
            "Answering with {} ({}) over {} chunks",
            self.llm.name(),
            self.llm.model(),
            contexts.len()
        );
        let reply = self.llm.complete(&messages, &self.options).await?;

        Ok(QueryResponse {
            answer: reply.trim().to_string(),
            citations: contexts.iter().map(|c| c.citation()).collect(),
        })
    }
}
