//! Format parsers: every supported file becomes an ordered list of pages

use calamine::{Data, Range, Reader};
use docx_rs::{
    DocumentChild, Docx, Paragraph, ParagraphChild, RunChild, TableCellContent, TableChild,
    TableRowChild,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::normalize::normalize;
use crate::config::IngestionConfig;
use crate::error::{Error, Result};
use crate::providers::converter::DocumentConverter;
use crate::providers::ocr::{OcrEngine, PageRenderer};
use crate::types::{FileKind, PageUnit};

/// Parser tunables
#[derive(Debug, Clone)]
pub struct ParserSettings {
    /// Pages with less embedded text than this are OCRed
    pub ocr_min_chars: usize,
    /// Render scale for OCR
    pub ocr_scale: f32,
    /// Character window for synthetic DOCX pages
    pub docx_page_chars: usize,
    /// Bound on embedded PDF text extraction
    pub pdf_timeout: Duration,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self::from(&IngestionConfig::default())
    }
}

impl From<&IngestionConfig> for ParserSettings {
    fn from(config: &IngestionConfig) -> Self {
        Self {
            ocr_min_chars: config.ocr_min_chars,
            ocr_scale: config.ocr_scale,
            docx_page_chars: config.docx_page_chars.max(1),
            pdf_timeout: Duration::from_secs(config.pdf_timeout_secs),
        }
    }
}

/// Multi-format file parser
#[derive(Clone)]
pub struct FileParser {
    settings: ParserSettings,
    renderer: Option<Arc<dyn PageRenderer>>,
    ocr: Option<Arc<dyn OcrEngine>>,
    converter: Option<Arc<dyn DocumentConverter>>,
}

impl FileParser {
    /// Parser without OCR or conversion support
    pub fn new(settings: ParserSettings) -> Self {
        Self {
            settings,
            renderer: None,
            ocr: None,
            converter: None,
        }
    }

    /// Enable OCR of pages without embedded text
    pub fn with_ocr(mut self, renderer: Arc<dyn PageRenderer>, ocr: Arc<dyn OcrEngine>) -> Self {
        self.renderer = Some(renderer);
        self.ocr = Some(ocr);
        self
    }

    /// Enable legacy document conversion
    pub fn with_converter(mut self, converter: Arc<dyn DocumentConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn ocr_available(&self) -> bool {
        self.renderer.is_some() && self.ocr.is_some()
    }

    pub fn converter_available(&self) -> bool {
        self.converter.is_some()
    }

    /// Parse a file of a known kind. Blocking: run it off the async runtime.
    pub fn parse(&self, path: &Path, kind: FileKind) -> Result<Vec<PageUnit>> {
        let filename = display_name(path);
        match kind {
            FileKind::Pdf => self.parse_pdf(path, &filename),
            FileKind::Docx => {
                let data = std::fs::read(path).map_err(|e| Error::parse(&filename, e.to_string()))?;
                self.parse_docx(&data, &filename)
            }
            FileKind::Xlsx => {
                let data = std::fs::read(path).map_err(|e| Error::parse(&filename, e.to_string()))?;
                parse_xlsx(&data, &filename)
            }
            FileKind::LegacyDoc => self.parse_legacy(path, &filename),
            FileKind::Unsupported => Err(Error::UnsupportedFileType(filename)),
        }
    }

    /// Parse PDF page by page, OCRing pages with too little embedded text
    fn parse_pdf(&self, path: &Path, filename: &str) -> Result<Vec<PageUnit>> {
        let data = std::fs::read(path).map_err(|e| Error::parse(filename, e.to_string()))?;
        let raw_pages = self.extract_pdf_pages(&data, filename)?;
        Ok(self.resolve_pdf_pages(path, filename, raw_pages))
    }

    /// Embedded text per page, bounded by a timeout since some fonts hang pdf-extract
    fn extract_pdf_pages(&self, data: &[u8], filename: &str) -> Result<Vec<String>> {
        use std::sync::mpsc;
        use std::thread;

        let data_vec = data.to_vec();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = pdf_extract::extract_text_from_mem_by_pages(&data_vec);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.settings.pdf_timeout) {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => {
                tracing::warn!("pdf-extract failed on {}: {}, trying lopdf", filename, e);
                extract_pdf_pages_fallback(data, filename)
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::error!(
                    "PDF extraction timeout after {:?} on {}, trying lopdf",
                    self.settings.pdf_timeout,
                    filename
                );
                extract_pdf_pages_fallback(data, filename)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("PDF extraction thread crashed on {}, trying lopdf", filename);
                extract_pdf_pages_fallback(data, filename)
            }
        }
    }

    /// Normalize each page, OCR the short ones and drop the empty ones
    fn resolve_pdf_pages(&self, path: &Path, filename: &str, raw_pages: Vec<String>) -> Vec<PageUnit> {
        let mut pages = Vec::with_capacity(raw_pages.len());
        for (index, raw) in raw_pages.into_iter().enumerate() {
            let page_number = index as u32 + 1;
            let mut text = normalize(&raw);
            if text.chars().count() < self.settings.ocr_min_chars {
                text = match self.ocr_page(path, page_number) {
                    Ok(ocr_text) => normalize(&ocr_text),
                    Err(e) => {
                        tracing::warn!("OCR failed for {} p.{}: {}", filename, page_number, e);
                        String::new()
                    }
                };
            }
            if text.is_empty() {
                tracing::debug!("{} p.{} has no text, skipping", filename, page_number);
                continue;
            }
            pages.push(PageUnit::new(text, page_number));
        }
        pages
    }

    fn ocr_page(&self, path: &Path, page: u32) -> Result<String> {
        let (Some(renderer), Some(ocr)) = (&self.renderer, &self.ocr) else {
            return Err(Error::ocr("no OCR engine configured"));
        };
        let image = renderer.render_page(path, page, self.settings.ocr_scale)?;
        ocr.recognize(&image)
    }

    /// Paragraphs then tables, cut into fixed character windows
    fn parse_docx(&self, data: &[u8], filename: &str) -> Result<Vec<PageUnit>> {
        let docx = docx_rs::read_docx(data).map_err(|e| Error::parse(filename, e.to_string()))?;
        let full = docx_lines(&docx).join("\n");
        Ok(paginate(&full, self.settings.docx_page_chars))
    }

    /// Convert to PDF in a private temporary directory, then parse the PDF
    fn parse_legacy(&self, path: &Path, filename: &str) -> Result<Vec<PageUnit>> {
        let converter = self.converter.as_ref().ok_or_else(|| {
            Error::conversion(
                filename,
                "LibreOffice 'soffice' not found. Set SOFFICE_PATH or install LibreOffice.",
            )
        })?;

        let scratch = tempfile::Builder::new()
            .prefix("kb-rag-convert-")
            .tempdir()
            .map_err(|e| Error::conversion(filename, format!("temp dir: {}", e)))?;
        let pdf = converter.convert_to_pdf(path, scratch.path())?;

        let pages = self.parse_pdf(&pdf, filename)?;
        if pages.is_empty() {
            return Err(Error::conversion(filename, "converted PDF contains no text"));
        }
        tracing::debug!("Converted {} with {} into {} pages", filename, converter.name(), pages.len());
        Ok(pages)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Per-page text via lopdf
fn extract_pdf_pages_fallback(data: &[u8], filename: &str) -> Result<Vec<String>> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| Error::parse(filename, format!("Failed to load PDF: {}", e)))?;

    // get_pages is keyed by 1-based page number, ascending
    Ok(doc
        .get_pages()
        .keys()
        .map(|&page| match doc.extract_text(&[page]) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("lopdf could not extract {} p.{}: {}", filename, page, e);
                String::new()
            }
        })
        .collect())
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(t) => text.push_str(&t.text),
                    RunChild::Tab(_) => text.push('\t'),
                    _ => {}
                }
            }
        }
    }
    text
}

/// Non-empty paragraphs in order, then each table row as `cell | cell`
#[allow(irrefutable_let_patterns)]
pub(crate) fn docx_lines(docx: &Docx) -> Vec<String> {
    let mut lines = Vec::new();

    for child in &docx.document.children {
        if let DocumentChild::Paragraph(p) = child {
            let text = paragraph_text(p);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
    }

    for child in &docx.document.children {
        let DocumentChild::Table(table) = child else {
            continue;
        };
        for row in &table.rows {
            let TableChild::TableRow(row) = row else {
                continue;
            };
            let cells: Vec<String> = row
                .cells
                .iter()
                .map(|cell| {
                    let TableRowChild::TableCell(cell) = cell else {
                        return String::new();
                    };
                    let raw: Vec<String> = cell
                        .children
                        .iter()
                        .filter_map(|content| match content {
                            TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
                            _ => None,
                        })
                        .collect();
                    normalize(&raw.join("\n"))
                })
                .collect();
            if cells.iter().any(|c| !c.is_empty()) {
                lines.push(cells.join(" | "));
            }
        }
    }

    lines
}

/// Cut text into `window`-character pages numbered from 1; empty windows are dropped
fn paginate(text: &str, window: usize) -> Vec<PageUnit> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(window.max(1))
        .enumerate()
        .filter_map(|(index, part)| {
            let text = normalize(&part.iter().collect::<String>());
            (!text.is_empty()).then(|| PageUnit::new(text, index as u32 + 1))
        })
        .collect()
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{:?}", e),
    }
}

/// One sheet as a page: header line then non-empty rows
fn sheet_page(name: &str, range: &Range<Data>, page_number: u32) -> PageUnit {
    let mut text = format!("Sheet: {}\n", name);
    for row in range.rows() {
        let cells: Vec<String> = row
            .iter()
            .map(cell_text)
            .filter(|c| !c.trim().is_empty())
            .collect();
        if !cells.is_empty() {
            text.push_str(&cells.join(" | "));
            text.push('\n');
        }
    }
    PageUnit::new(normalize(&text), page_number)
}

/// One page per worksheet, numbered by sheet position
fn parse_xlsx(data: &[u8], filename: &str) -> Result<Vec<PageUnit>> {
    let cursor = std::io::Cursor::new(data);
    let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
        .map_err(|e| Error::parse(filename, e.to_string()))?;

    let mut pages = Vec::new();
    for (index, sheet_name) in workbook.sheet_names().to_vec().into_iter().enumerate() {
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| Error::parse(filename, format!("sheet '{}': {}", sheet_name, e)))?;
        pages.push(sheet_page(&sheet_name, &range, index as u32 + 1));
    }
    Ok(pages)
}
