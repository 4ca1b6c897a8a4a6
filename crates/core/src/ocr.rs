//! OCR backends used when a PDF has no usable text layer.
//!
//! The default backend shells out to `pdftoppm` (poppler-utils) to rasterize
//! a page and `tesseract` to recognise it. Both must be on `PATH`.

use crate::error::OcrError;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tempfile::TempDir;
use tracing::debug;

pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_available(&self) -> bool;

    /// Recognises a single 1-based page of a PDF.
    fn ocr_pdf_page(&self, pdf_path: &Path, page: u32) -> Result<String, OcrError>;
}

#[derive(Debug, Clone)]
pub struct TesseractCli {
    pub language: String,
    pub dpi: u32,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            dpi: 300,
        }
    }
}

impl TesseractCli {
    pub fn new(language: impl Into<String>, dpi: u32) -> Self {
        Self {
            language: language.into(),
            dpi,
        }
    }

    fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.language])
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            }
            Ok(output) => Err(OcrError::OcrFailed(format!(
                "tesseract failed: {}",
                String::from_utf8_lossy(&output.stderr)
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                OcrError::BackendNotAvailable("tesseract not found (install tesseract-ocr)".into()),
            ),
            Err(e) => Err(OcrError::Io(e)),
        }
    }

    fn rasterize_page(&self, pdf_path: &Path, page: u32, out_dir: &Path) -> Result<PathBuf, OcrError> {
        let page_str = page.to_string();
        let dpi = self.dpi.to_string();
        let prefix = out_dir.join("page");

        let status = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi, "-f", &page_str, "-l", &page_str])
            .arg(pdf_path)
            .arg(&prefix)
            .status();

        match status {
            Ok(s) if s.success() => find_page_image(out_dir, page)
                .ok_or_else(|| OcrError::OcrFailed(format!("no image generated for page {page}"))),
            Ok(_) => Err(OcrError::OcrFailed("pdftoppm failed to rasterize page".into())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                OcrError::BackendNotAvailable("pdftoppm not found (install poppler-utils)".into()),
            ),
            Err(e) => Err(OcrError::Io(e)),
        }
    }
}

impl OcrEngine for TesseractCli {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        which::which("tesseract").is_ok() && which::which("pdftoppm").is_ok()
    }

    fn ocr_pdf_page(&self, pdf_path: &Path, page: u32) -> Result<String, OcrError> {
        let start = Instant::now();
        let temp_dir = TempDir::new()?;
        let image = self.rasterize_page(pdf_path, page, temp_dir.path())?;
        let text = self.run_tesseract(&image)?;
        debug!(page, elapsed_ms = start.elapsed().as_millis() as u64, "ocr page done");
        Ok(text)
    }
}

// pdftoppm zero-pads the page number according to the document's page count.
fn find_page_image(dir: &Path, page: u32) -> Option<PathBuf> {
    (1..=4)
        .map(|width| dir.join(format!("page-{:0width$}.png", page, width = width)))
        .find(|p| p.exists())
}
