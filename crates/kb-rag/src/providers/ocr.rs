//! OCR seams: page rendering and image recognition

use std::path::Path;

use crate::error::Result;

/// Renders one PDF page to a PNG bitmap
pub trait PageRenderer: Send + Sync {
    /// Render 1-based `page` of `pdf` at `scale` (1.0 = 72 dpi)
    fn render_page(&self, pdf: &Path, page: u32, scale: f32) -> Result<Vec<u8>>;

    fn name(&self) -> &str;
}

/// Recognizes text in a PNG bitmap
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image_png: &[u8]) -> Result<String>;

    fn name(&self) -> &str;
}
