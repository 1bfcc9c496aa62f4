//! Command-line tool adapters: LibreOffice conversion, pdftoppm rendering, tesseract OCR

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};
use crate::providers::converter::DocumentConverter;
use crate::providers::ocr::{OcrEngine, PageRenderer};

/// macOS application bundle location of soffice
const MACOS_SOFFICE: &str = "/Applications/LibreOffice.app/Contents/MacOS/soffice";

/// Whether `program <arg>` can be spawned at all
fn tool_runs(program: impl AsRef<OsStr>, arg: &str) -> bool {
    Command::new(program).arg(arg).output().is_ok()
}

/// Find an executable on `PATH`
fn which(program: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Check if tesseract OCR is available
pub fn has_tesseract() -> bool {
    tool_runs("tesseract", "--version")
}

/// Check if pdftoppm is available (`-v` prints to stderr, so only spawning is checked)
pub fn has_pdftoppm() -> bool {
    tool_runs("pdftoppm", "-v")
}

fn tool_error(tool: &str, output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{} exited with {}: {}", tool, output.status, stderr.trim())
}

/// Converts legacy documents to PDF with headless LibreOffice
#[derive(Debug, Clone)]
pub struct LibreOfficeConverter {
    binary: PathBuf,
}

impl LibreOfficeConverter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Locate soffice: explicit path, then `PATH` (`soffice`, `libreoffice`), then the macOS bundle
    pub fn locate(explicit: Option<&Path>) -> Option<Self> {
        if let Some(path) = explicit {
            if path.exists() {
                return Some(Self::new(path));
            }
            tracing::warn!("Configured soffice path {} does not exist", path.display());
        }
        which("soffice")
            .or_else(|| which("libreoffice"))
            .or_else(|| {
                let mac = PathBuf::from(MACOS_SOFFICE);
                mac.exists().then_some(mac)
            })
            .map(Self::new)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl DocumentConverter for LibreOfficeConverter {
    fn convert_to_pdf(&self, input: &Path, out_dir: &Path) -> Result<PathBuf> {
        let filename = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let output = Command::new(&self.binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(input)
            .output()
            .map_err(|e| Error::conversion(&filename, format!("cannot run soffice: {}", e)))?;

        if !output.status.success() {
            return Err(Error::conversion(&filename, tool_error("soffice", &output)));
        }

        let mut pdf_name = input.file_stem().unwrap_or_default().to_os_string();
        pdf_name.push(".pdf");
        let pdf = out_dir.join(pdf_name);
        if !pdf.is_file() {
            return Err(Error::conversion(&filename, "LibreOffice produced no PDF"));
        }
        Ok(pdf)
    }

    fn name(&self) -> &str {
        "libreoffice"
    }
}

/// Renders PDF pages with poppler's pdftoppm
#[derive(Debug, Clone, Default)]
pub struct PdftoppmRenderer;

impl PdftoppmRenderer {
    /// Renderer if pdftoppm is installed
    pub fn detect() -> Option<Self> {
        has_pdftoppm().then_some(Self)
    }
}

impl PageRenderer for PdftoppmRenderer {
    fn render_page(&self, pdf: &Path, page: u32, scale: f32) -> Result<Vec<u8>> {
        let dpi = (72.0 * scale).round().max(1.0) as u32;
        let dir = tempfile::tempdir()?;
        let prefix = dir.path().join("page");
        let page_arg = page.to_string();

        let output = Command::new("pdftoppm")
            .args(["-f", &page_arg, "-l", &page_arg])
            .args(["-r", &dpi.to_string()])
            .args(["-png", "-singlefile"])
            .arg(pdf)
            .arg(&prefix)
            .output()
            .map_err(|e| Error::ocr(format!("cannot run pdftoppm: {}", e)))?;

        if !output.status.success() {
            return Err(Error::ocr(tool_error("pdftoppm", &output)));
        }

        std::fs::read(prefix.with_extension("png"))
            .map_err(|e| Error::ocr(format!("pdftoppm produced no image for page {}: {}", page, e)))
    }

    fn name(&self) -> &str {
        "pdftoppm"
    }
}

/// Tesseract OCR through its command-line interface
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    language: String,
}

impl TesseractOcr {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    /// Engine if tesseract is installed
    pub fn detect(language: &str) -> Option<Self> {
        has_tesseract().then(|| Self::new(language))
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image_png: &[u8]) -> Result<String> {
        let mut image = tempfile::Builder::new()
            .prefix("kb-rag-ocr-")
            .suffix(".png")
            .tempfile()?;
        image.write_all(image_png)?;
        image.flush()?;

        let output = Command::new("tesseract")
            .arg(image.path())
            .arg("stdout")
            .args(["-l", &self.language])
            .output()
            .map_err(|e| Error::ocr(format!("cannot run tesseract: {}", e)))?;

        if !output.status.success() {
            return Err(Error::ocr(tool_error("tesseract", &output)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}
