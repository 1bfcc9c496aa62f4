//! Configuration for the knowledge-base service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Ingestion (parsing, OCR, chunking) configuration
    pub ingestion: IngestionConfig,
    /// Job subsystem configuration
    pub jobs: JobsConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Completion (LLM) configuration
    pub llm: LlmConfig,
    /// Vector index configuration
    pub vector_db: VectorDbConfig,
}

impl RagConfig {
    /// Load configuration from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                toml::from_str(&raw)
                    .map_err(|e| Error::Config(format!("invalid {}: {}", path.display(), e)))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DATA_DIR") {
            self.ingestion.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("JOBS_DIR") {
            self.jobs.jobs_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SOFFICE_PATH") {
            self.ingestion.soffice_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = parse_env("PORT", &v)?;
        }
        if let Some(v) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = v
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(v) = lookup("LLM_PROVIDER") {
            self.llm.provider = match v.trim().to_lowercase().as_str() {
                "ollama" => LlmProviderKind::Ollama,
                "openai" => LlmProviderKind::OpenAi,
                "groq" => LlmProviderKind::Groq,
                other => {
                    return Err(Error::Config(format!("unknown LLM_PROVIDER '{}'", other)))
                }
            };
        }
        if let Some(v) = lookup("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(v);
        }
        if let Some(v) = lookup("OPENAI_MODEL") {
            self.llm.openai_model = v;
        }
        if let Some(v) = lookup("GROQ_API_KEY") {
            self.llm.groq_api_key = Some(v);
        }
        if let Some(v) = lookup("GROQ_MODEL") {
            self.llm.groq_model = v;
        }
        if let Some(v) = lookup("OLLAMA_BASE_URL") {
            self.embeddings.base_url = v.clone();
            self.llm.ollama_base_url = v;
        }
        if let Some(v) = lookup("EMBEDDING_MODEL") {
            self.embeddings.model = v;
        }
        if let Some(v) = lookup("MAX_TOKENS") {
            self.llm.max_tokens = parse_env("MAX_TOKENS", &v)?;
        }
        if let Some(v) = lookup("TEMPERATURE") {
            self.llm.temperature = parse_env("TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("TOP_K") {
            self.llm.top_k = parse_env("TOP_K", &v)?;
        }
        Ok(())
    }

    /// Create the data, jobs and upload directories. Failures are logged, not fatal.
    pub fn ensure_dirs(&self) {
        for dir in [
            &self.ingestion.data_dir,
            &self.jobs.jobs_dir,
            &self.jobs.upload_root,
        ] {
            if let Err(e) = std::fs::create_dir_all(dir) {
                tracing::warn!("Could not create directory {}: {}", dir.display(), e);
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid value for {}: '{}'", key, value)))
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Directory scanned by a rebuild; uploads are copied here
    pub data_dir: PathBuf,
    /// Soft chunk budget in characters
    pub chunk_size: usize,
    /// Characters carried over from the previous chunk
    pub chunk_overlap: usize,
    /// Pages with less embedded text than this are OCRed
    pub ocr_min_chars: usize,
    /// Render scale for OCR (1.0 = 72 dpi)
    pub ocr_scale: f32,
    /// OCR language
    pub ocr_language: String,
    /// Character window for synthetic DOCX pages
    pub docx_page_chars: usize,
    /// Explicit soffice binary
    pub soffice_path: Option<PathBuf>,
    /// Timeout for embedded PDF text extraction
    pub pdf_timeout_secs: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            chunk_size: 500,
            chunk_overlap: 120,
            ocr_min_chars: 30,
            ocr_scale: 2.0,
            ocr_language: "eng".to_string(),
            docx_page_chars: 1500,
            soffice_path: None,
            pdf_timeout_secs: 60,
        }
    }
}

/// Job subsystem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Directory holding one JSON record per job
    pub jobs_dir: PathBuf,
    /// Parent of the per-job upload directories
    pub upload_root: PathBuf,
    /// A running job with no progress for this long is failed on the next read
    pub watchdog_idle_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            jobs_dir: PathBuf::from("./storage/jobs"),
            upload_root: std::env::temp_dir().join("kb-rag-uploads"),
            watchdog_idle_secs: 30 * 60,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Embedding dimensions
    pub dimensions: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for failed requests
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

/// Completion provider selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    /// Local Ollama chat API
    Ollama,
    /// OpenAI chat completions
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    /// Groq (OpenAI-compatible)
    Groq,
}

/// Completion (LLM) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which provider answers questions
    pub provider: LlmProviderKind,
    /// Ollama base URL
    pub ollama_base_url: String,
    /// Ollama chat model
    pub ollama_model: String,
    /// OpenAI API key
    pub openai_api_key: Option<String>,
    /// OpenAI model
    pub openai_model: String,
    /// OpenAI base URL
    pub openai_base_url: String,
    /// Groq API key
    pub groq_api_key: Option<String>,
    /// Groq model
    pub groq_model: String,
    /// Groq base URL
    pub groq_base_url: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens per answer
    pub max_tokens: u32,
    /// Chunks retrieved per question
    pub top_k: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::OpenAi,
            ollama_base_url: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2:3b".to_string(),
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            groq_api_key: None,
            groq_model: "llama-3.1-70b-versatile".to_string(),
            groq_base_url: "https://api.groq.com/openai/v1".to_string(),
            temperature: 0.2,
            max_tokens: 800,
            top_k: 8,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Snapshot file for the in-memory index; `None` keeps it in memory only
    pub snapshot_path: Option<PathBuf>,
    /// Collection name recorded in the snapshot
    pub collection: String,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        let snapshot_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("./storage"))
            .join("kb-rag")
            .join("index.json");

        Self {
            snapshot_path: Some(snapshot_path),
            collection: "kb_docs".to_string(),
        }
    }
}
