//! Legacy document to PDF conversion seam

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Converts a document to PDF out of process
pub trait DocumentConverter: Send + Sync {
    /// Convert `input` into `out_dir`, returning the produced PDF.
    /// Fails with `Error::Conversion` when no PDF is produced.
    fn convert_to_pdf(&self, input: &Path, out_dir: &Path) -> Result<PathBuf>;

    fn name(&self) -> &str;
}
