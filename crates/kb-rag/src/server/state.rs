//! Application state for the knowledge-base server

use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::AnswerComposer;
use crate::ingestion::IngestPipeline;
use crate::processing::{FileJobStore, JobManager};
use crate::providers::{
    build_completion_provider, CompletionProvider, EmbeddingProvider, MemoryVectorStore,
    OllamaEmbedder, VectorStoreProvider,
};
use crate::retrieval::Retriever;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: RagConfig,
    /// Embedding provider, also owned by the index
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorStoreProvider>,
    pipeline: Arc<IngestPipeline>,
    jobs: JobManager,
    retriever: Retriever,
    composer: AnswerComposer,
}

impl AppState {
    /// Build every provider from configuration
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!(
            "Initializing application state (llm: {:?}, embeddings: {})",
            config.llm.provider,
            config.embeddings.model
        );

        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OllamaEmbedder::new(&config.embeddings)?);
        let index: Arc<dyn VectorStoreProvider> =
            Arc::new(MemoryVectorStore::open(Arc::clone(&embedder), &config.vector_db)?);
        let llm = build_completion_provider(&config.llm)?;

        tracing::info!(
            "Index '{}' ready with {} records",
            config.vector_db.collection,
            index.count().await?
        );

        Self::from_parts(config, embedder, index, llm)
    }

    /// Assemble state around already-built providers
    pub fn from_parts(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorStoreProvider>,
        llm: Arc<dyn CompletionProvider>,
    ) -> Result<Self> {
        let pipeline = Arc::new(IngestPipeline::from_config(&config.ingestion, Arc::clone(&index))?);
        let store = Arc::new(FileJobStore::open(&config.jobs.jobs_dir)?);
        let jobs = JobManager::new(store, Arc::clone(&pipeline), &config.jobs);
        let retriever = Retriever::new(Arc::clone(&index), config.llm.top_k);
        let composer = AnswerComposer::from_config(retriever.clone(), llm, &config.llm);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                embedder,
                index,
                pipeline,
                jobs,
                retriever,
                composer,
            }),
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedder
    }

    pub fn index(&self) -> &Arc<dyn VectorStoreProvider> {
        &self.inner.index
    }

    pub fn pipeline(&self) -> &Arc<IngestPipeline> {
        &self.inner.pipeline
    }

    pub fn jobs(&self) -> &JobManager {
        &self.inner.jobs
    }

    pub fn retriever(&self) -> &Retriever {
        &self.inner.retriever
    }

    pub fn composer(&self) -> &AnswerComposer {
        &self.inner.composer
    }
}
