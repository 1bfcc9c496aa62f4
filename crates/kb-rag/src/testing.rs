//! Test doubles and fixture builders

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::providers::converter::DocumentConverter;
use crate::providers::embedding::EmbeddingProvider;
use crate::providers::llm::{ChatMessage, CompletionOptions, CompletionProvider};
use crate::providers::ocr::{OcrEngine, PageRenderer};
use crate::providers::vector_store::{IndexFilter, IndexHit, IndexRecord, VectorStoreProvider};

const VOCABULARY: &[&str] = &[
    "revenue", "growth", "forecast", "margin", "staff", "holiday", "calendar", "policy",
    "leave", "invoice",
];

/// Bag-of-words embedder over a fixed vocabulary; unknown words share the last dimension
pub struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; VOCABULARY.len() + 1];
        for word in text.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            let slot = VOCABULARY
                .iter()
                .position(|v| *v == word)
                .unwrap_or(VOCABULARY.len());
            vector[slot] += 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        VOCABULARY.len() + 1
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

enum AddBehavior {
    Record,
    Fail,
    Panic,
}

/// Index that records every add, optionally held behind a gate
pub struct RecordingIndex {
    records: Mutex<Vec<IndexRecord>>,
    flushes: AtomicUsize,
    behavior: AddBehavior,
    gate: Option<Arc<Semaphore>>,
}

impl Default for RecordingIndex {
    fn default() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            flushes: AtomicUsize::new(0),
            behavior: AddBehavior::Record,
            gate: None,
        }
    }
}

impl RecordingIndex {
    /// Every add fails with `Error::Index`
    pub fn failing() -> Self {
        Self {
            behavior: AddBehavior::Fail,
            ..Default::default()
        }
    }

    /// Every add panics
    pub fn panicking() -> Self {
        Self {
            behavior: AddBehavior::Panic,
            ..Default::default()
        }
    }

    /// Adds block until permits are added to the returned semaphore
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Self {
                gate: Some(Arc::clone(&gate)),
                ..Default::default()
            },
            gate,
        )
    }

    /// Index pre-populated with records
    pub fn with_records(records: Vec<IndexRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Default::default()
        }
    }

    pub fn records(&self) -> Vec<IndexRecord> {
        self.records.lock().clone()
    }

    pub fn flushes(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStoreProvider for RecordingIndex {
    async fn add(&self, record: IndexRecord) -> Result<()> {
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| Error::index(e.to_string()))?;
        }
        match self.behavior {
            AddBehavior::Record => {
                self.records.lock().push(record);
                Ok(())
            }
            AddBehavior::Fail => Err(Error::index("index unavailable")),
            AddBehavior::Panic => panic!("index exploded on {}", record.id),
        }
    }

    /// Records in insertion order, with distances 0.1, 0.2, ...
    async fn query(&self, _text: &str, k: usize) -> Result<Vec<IndexHit>> {
        Ok(self
            .records
            .lock()
            .iter()
            .take(k)
            .enumerate()
            .map(|(i, record)| IndexHit {
                record: record.clone(),
                distance: 0.1 * (i as f32 + 1.0),
            })
            .collect())
    }

    async fn get(&self, filter: &IndexFilter) -> Result<Vec<IndexRecord>> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.lock().len())
    }

    async fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Renders a page as the ASCII bytes of its page number
pub struct PageEchoRenderer;

impl PageRenderer for PageEchoRenderer {
    fn render_page(&self, _pdf: &Path, page: u32, _scale: f32) -> Result<Vec<u8>> {
        Ok(page.to_string().into_bytes())
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// Reads back what [`PageEchoRenderer`] produced
pub struct PageEchoOcr;

impl OcrEngine for PageEchoOcr {
    fn recognize(&self, image_png: &[u8]) -> Result<String> {
        Ok(format!(
            "scanned\n text of page {}\n",
            String::from_utf8_lossy(image_png)
        ))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

pub struct FailingOcr;

impl OcrEngine for FailingOcr {
    fn recognize(&self, _image_png: &[u8]) -> Result<String> {
        Err(Error::ocr("engine crashed"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// OCR that succeeds without reading anything
pub struct EmptyOcr;

impl OcrEngine for EmptyOcr {
    fn recognize(&self, _image_png: &[u8]) -> Result<String> {
        Ok(" \n ".to_string())
    }

    fn name(&self) -> &str {
        "empty"
    }
}

pub struct PanickingConverter;

impl DocumentConverter for PanickingConverter {
    fn convert_to_pdf(&self, _input: &Path, _out_dir: &Path) -> Result<PathBuf> {
        panic!("converter blew up")
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

/// Completion double that records prompts and returns a fixed reply
pub struct ScriptedLlm {
    reply: String,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedLlm {
    async fn complete(&self, messages: &[ChatMessage], _options: &CompletionOptions) -> Result<String> {
        self.seen.lock().push(messages.to_vec());
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

/// DOCX with one paragraph per entry
pub fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    use docx_rs::{Docx, Paragraph, Run};

    let docx = paragraphs.iter().fold(Docx::new(), |docx, text| {
        docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text)))
    });
    let mut buf = Vec::new();
    docx.build()
        .pack(std::io::Cursor::new(&mut buf))
        .expect("pack docx fixture");
    buf
}

/// PDF with one Helvetica text line per page; an empty entry yields a page without text
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.4");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = if text.is_empty() {
            String::new()
        } else {
            format!(
                "BT /F1 12 Tf 72 720 Td ({}) Tj ET",
                text.replace('\\', "\\\\")
                    .replace('(', "\\(")
                    .replace(')', "\\)")
            )
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save pdf fixture");
    buf
}
