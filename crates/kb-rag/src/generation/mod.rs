//! Answer generation with the configured LLM and source citations

mod answer;
pub mod prompt;

pub use answer::AnswerComposer;
pub use prompt::{PromptBuilder, SYSTEM_PROMPT};
