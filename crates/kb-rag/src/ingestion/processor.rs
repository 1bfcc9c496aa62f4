//! Ingestion pipeline orchestration: enumerate, parse, chunk, index

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::IngestionConfig;
use crate::error::{panic_message, Result};
use crate::providers::vector_store::{IndexRecord, VectorStoreProvider};
use crate::types::{Chunk, FileKind, IngestResult, SkippedFile};

use super::chunker::TextChunker;
use super::external_parser::{LibreOfficeConverter, PdftoppmRenderer, TesseractOcr};
use super::parser::{FileParser, ParserSettings};

/// Suffix of conversion artifacts that must never be re-ingested
const CONVERTED_SUFFIX: &str = ".converted.pdf";

/// Observer told when each file of a batch starts
#[async_trait]
pub trait IngestProgress: Send + Sync {
    /// `position` is 1-based
    async fn file_started(&self, position: usize, total: usize, filename: &str);
}

/// No progress reporting
#[async_trait]
impl IngestProgress for () {
    async fn file_started(&self, _position: usize, _total: usize, _filename: &str) {}
}

/// Main ingestion pipeline
pub struct IngestPipeline {
    parser: FileParser,
    chunker: TextChunker,
    index: Arc<dyn VectorStoreProvider>,
    data_dir: PathBuf,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(
        parser: FileParser,
        chunker: TextChunker,
        index: Arc<dyn VectorStoreProvider>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            parser,
            chunker,
            index,
            data_dir: data_dir.into(),
        }
    }

    /// Build from configuration, wiring whichever external tools are installed
    pub fn from_config(config: &IngestionConfig, index: Arc<dyn VectorStoreProvider>) -> Result<Self> {
        let chunker = TextChunker::new(config.chunk_size, config.chunk_overlap)?;
        let mut parser = FileParser::new(ParserSettings::from(config));

        match (PdftoppmRenderer::detect(), TesseractOcr::detect(&config.ocr_language)) {
            (Some(renderer), Some(ocr)) => {
                tracing::info!("OCR enabled (pdftoppm + tesseract, lang {})", config.ocr_language);
                parser = parser.with_ocr(Arc::new(renderer), Arc::new(ocr));
            }
            _ => tracing::warn!(
                "OCR unavailable: install poppler-utils and tesseract-ocr to read scanned pages"
            ),
        }

        match LibreOfficeConverter::locate(config.soffice_path.as_deref()) {
            Some(converter) => {
                tracing::info!("Legacy conversion via {}", converter.binary().display());
                parser = parser.with_converter(Arc::new(converter));
            }
            None => tracing::warn!(
                "LibreOffice 'soffice' not found; .doc/.docm files will be skipped"
            ),
        }

        Ok(Self::new(parser, chunker, index, config.data_dir.clone()))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn index(&self) -> &Arc<dyn VectorStoreProvider> {
        &self.index
    }

    /// Re-ingest the configured data directory
    pub async fn rebuild(&self) -> Result<IngestResult> {
        self.ingest_directory(&self.data_dir).await
    }

    /// Ingest every supported file directly inside `dir`
    pub async fn ingest_directory(&self, dir: &Path) -> Result<IngestResult> {
        if !tokio::fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Ok(IngestResult {
                note: Some(format!("No data dir: {}", dir.display())),
                ..Default::default()
            });
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();

        tracing::info!("Ingesting {} files from {}", files.len(), dir.display());
        self.ingest_files(&files, &()).await
    }

    /// Copy uploads into the data directory, then ingest exactly those files
    pub async fn ingest_uploads(&self, files: &[PathBuf]) -> Result<IngestResult> {
        self.ingest_uploads_with_progress(files, &()).await
    }

    /// [`Self::ingest_uploads`], reporting each file to `progress` before it is parsed
    pub async fn ingest_uploads_with_progress(
        &self,
        files: &[PathBuf],
        progress: &dyn IngestProgress,
    ) -> Result<IngestResult> {
        if let Err(e) = tokio::fs::create_dir_all(&self.data_dir).await {
            tracing::warn!("Cannot create data dir {}: {}", self.data_dir.display(), e);
        }

        let mut targets = Vec::with_capacity(files.len());
        let mut names = Vec::with_capacity(files.len());
        for file in files {
            let Some(name) = file.file_name() else {
                continue;
            };
            names.push(name.to_string_lossy().into_owned());

            let target = self.data_dir.join(name);
            match tokio::fs::copy(file, &target).await {
                Ok(_) => targets.push(target),
                Err(e) => {
                    tracing::warn!(
                        "Could not keep {} in {}: {}, ingesting the upload in place",
                        name.to_string_lossy(),
                        self.data_dir.display(),
                        e
                    );
                    targets.push(file.clone());
                }
            }
        }

        let mut result = self.ingest_files(&targets, progress).await?;
        result.uploaded = Some(names);
        Ok(result)
    }

    async fn ingest_files(&self, files: &[PathBuf], progress: &dyn IngestProgress) -> Result<IngestResult> {
        let mut result = IngestResult::default();
        for (position, path) in files.iter().enumerate() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            progress.file_started(position + 1, files.len(), &name).await;
            self.ingest_file(path, &mut result).await?;
        }
        self.index.flush().await?;
        tracing::info!(
            "Ingestion finished: {} chunks added, {} files skipped",
            result.chunks_added,
            result.skipped.len()
        );
        Ok(result)
    }

    /// Parse, chunk and index one file. Per-file failures are recorded, index failures returned.
    async fn ingest_file(&self, path: &Path, result: &mut IngestResult) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if name.to_lowercase().ends_with(CONVERTED_SUFFIX) {
            tracing::debug!("Skipping conversion artifact {}", name);
            return Ok(());
        }

        let kind = FileKind::from_path(path);
        if !kind.is_supported() {
            tracing::info!("Skipping unsupported file type: {}", name);
            result.skipped.push(SkippedFile {
                filename: name,
                reason: "unsupported file type".to_string(),
            });
            return Ok(());
        }

        let parser = self.parser.clone();
        let owned_path = path.to_path_buf();
        let parsed = match tokio::task::spawn_blocking(move || parser.parse(&owned_path, kind)).await {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Parser crashed on {}: {}", name, e);
                result.skipped.push(SkippedFile {
                    filename: name,
                    reason: format!("parser crashed: {}", join_message(e)),
                });
                return Ok(());
            }
        };

        let pages = match parsed {
            Ok(pages) => pages,
            Err(e) if e.is_per_file() => {
                tracing::warn!("Could not parse {}: {}", name, e);
                result.skipped.push(SkippedFile {
                    filename: name,
                    reason: e.to_string(),
                });
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let mut added = 0usize;
        for page in &pages {
            for text in self.chunker.chunk(&page.text) {
                let chunk = Chunk::new(text, name.as_str(), page.page_number);
                self.index.add(IndexRecord::from(&chunk)).await?;
                added += 1;
            }
        }

        tracing::info!("Indexed {} ({} pages, {} chunks)", name, pages.len(), added);
        result.chunks_added += added;
        Ok(())
    }
}

/// Panic payload text of a failed blocking task
fn join_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    panic_message(err.into_panic().as_ref())
}
