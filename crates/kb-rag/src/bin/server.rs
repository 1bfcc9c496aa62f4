//! Knowledge-base server binary
//!
//! Run with: cargo run -p kb-rag --bin kb-rag-server -- --config kb-rag.toml

use clap::Parser;
use kb_rag::{config::RagConfig, server::RagServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "kb-rag-server", version, about = "Document Q&A with source citations")]
struct Args {
    /// TOML configuration file; environment variables override it
    #[arg(short, long, env = "KB_RAG_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kb_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = RagConfig::load(args.config.as_deref())?;
    config.ensure_dirs();

    tracing::info!("Configuration loaded");
    tracing::info!("  - Data dir: {}", config.ingestion.data_dir.display());
    tracing::info!("  - Jobs dir: {}", config.jobs.jobs_dir.display());
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - LLM provider: {:?}", config.llm.provider);
    tracing::info!(
        "  - Chunk size: {} (overlap {})",
        config.ingestion.chunk_size,
        config.ingestion.chunk_overlap
    );

    let server = RagServer::new(config).await?;
    tracing::info!("Health: http://{}/health", server.address());
    server.start().await?;

    Ok(())
}
