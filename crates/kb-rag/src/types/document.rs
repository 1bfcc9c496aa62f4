//! Page and chunk types with source tracking for citations

use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// File kinds the ingestion pipeline knows how to handle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Excel workbook (.xlsx)
    Xlsx,
    /// Legacy Word document (.doc, .docm) - requires LibreOffice
    LegacyDoc,
    /// Anything else
    Unsupported,
}

impl FileKind {
    /// Classify by extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "xlsx" => Self::Xlsx,
            "doc" | "docm" => Self::LegacyDoc,
            _ => Self::Unsupported,
        }
    }

    /// Classify a path by its extension
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unsupported)
    }

    /// Whether the pipeline can parse this kind
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// One page, sheet or text window of a parsed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUnit {
    /// Normalized page text
    pub text: String,
    /// 1-based page number
    pub page_number: u32,
}

impl PageUnit {
    pub fn new(text: impl Into<String>, page_number: u32) -> Self {
        Self {
            text: text.into(),
            page_number,
        }
    }
}

/// A retrieval-sized piece of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Chunk text
    pub text: String,
    /// Originating file name
    pub source_filename: String,
    /// Page the chunk was cut from
    pub page_number: u32,
}

impl Chunk {
    /// Create a new chunk with a fresh id
    pub fn new(text: impl Into<String>, source_filename: impl Into<String>, page_number: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            source_filename: source_filename.into(),
            page_number,
        }
    }

    /// Text stored in the index: provenance header followed by the chunk
    pub fn document_text(&self) -> String {
        format!(
            "{} | page {}\n{}",
            self.source_filename, self.page_number, self.text
        )
    }
}
