//! Provider abstractions for embeddings, completion, vector storage and external tools
//!
//! Traits here are the seams between the pipeline and its backends: Ollama for
//! embeddings, Ollama/OpenAI/Groq for completion, an in-process cosine index,
//! and command-line tools for OCR and legacy conversion.

pub mod converter;
pub mod embedding;
pub mod llm;
pub mod local;
pub mod ocr;
pub mod ollama;
pub mod openai;
pub mod retry;
pub mod vector_store;

pub use converter::DocumentConverter;
pub use embedding::EmbeddingProvider;
pub use llm::{build_completion_provider, ChatMessage, CompletionOptions, CompletionProvider};
pub use local::MemoryVectorStore;
pub use ocr::{OcrEngine, PageRenderer};
pub use ollama::{OllamaEmbedder, OllamaLlm};
pub use openai::OpenAiCompatibleLlm;
pub use vector_store::{IndexFilter, IndexHit, IndexRecord, RecordMetadata, VectorStoreProvider};
