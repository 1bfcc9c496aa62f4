//! Prompt templates for grounded answers

use crate::providers::llm::ChatMessage;
use crate::types::RetrievedChunk;

/// Fixed system instruction sent with every question
pub const SYSTEM_PROMPT: &str = "You are a helpful analyst for Ezzogenics. Answer ONLY using the provided context.

If the answer is not present in the context, say you don't have enough information and suggest where to look.
Always include a short bullet list of key facts you used.
Include no speculative claims. Keep answers concise and specific.
";

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Context blocks, one per retrieved chunk, separated by blank lines
    pub fn build_context(contexts: &[RetrievedChunk]) -> String {
        contexts
            .iter()
            .map(|c| format!("[Source: {} p.{}]\n{}", c.source, c.page, c.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// User message; the empty-context form tells the model nothing matched
    pub fn build_user_message(question: &str, contexts: &[RetrievedChunk]) -> String {
        if contexts.is_empty() {
            format!("No relevant context found.\n\nQuestion: {}\n\nAnswer:", question)
        } else {
            format!(
                "Context:\n{}\n\nQuestion: {}\n\nAnswer:",
                Self::build_context(contexts),
                question
            )
        }
    }

    /// System + user messages for one question
    pub fn build_messages(question: &str, contexts: &[RetrievedChunk]) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(Self::build_user_message(question, contexts)),
        ]
    }
}
