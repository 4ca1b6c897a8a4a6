use crate::config::ExtractionConfig;
use crate::error::{ExtractionError, OcrError};
use crate::models::{ExtractedText, TextKind};
use crate::ocr::{OcrEngine, TesseractCli};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Pdf,
    Csv,
}

impl DocumentType {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("pdf") => Some(DocumentType::Pdf),
            Some("csv") => Some(DocumentType::Csv),
            _ => None,
        }
    }
}

/// Turns a PDF or CSV into plain text. Never writes to the source file.
pub struct Extractor {
    config: ExtractionConfig,
    ocr: Box<dyn OcrEngine>,
}

impl Extractor {
    pub fn new(config: ExtractionConfig) -> Self {
        let ocr = TesseractCli::new(config.ocr_language.clone(), config.ocr_dpi);
        Self::with_ocr(config, Box::new(ocr))
    }

    pub fn with_ocr(config: ExtractionConfig, ocr: Box<dyn OcrEngine>) -> Self {
        Self { config, ocr }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn extract(&self, path: &Path) -> Result<ExtractedText, ExtractionError> {
        let kind = DocumentType::from_path(path)
            .ok_or_else(|| ExtractionError::Unsupported(path.to_path_buf()))?;
        let bytes = fs::read(path).map_err(|source| ExtractionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match kind {
            DocumentType::Pdf => self.extract_pdf(path, &bytes),
            DocumentType::Csv => extract_csv(path, &bytes, self.config.csv_sample_rows),
        }
    }

    fn extract_pdf(&self, path: &Path, bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        if infer::get(bytes).map(|t| t.mime_type()) != Some("application/pdf") {
            return Err(ExtractionError::Pdf {
                path: path.to_path_buf(),
                message: "not a PDF document".to_string(),
            });
        }

        let direct = pdf_text(bytes);
        let text = match &direct {
            Ok(t) => t.as_str(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "direct pdf text extraction failed");
                ""
            }
        };
        let chars = text.trim().chars().count();
        if chars >= self.config.min_text_len {
            return Ok(pdf_result(path, text.to_string(), TextKind::PdfText));
        }

        debug!(path = %path.display(), chars, "text layer too short, trying ocr");
        if !self.config.ocr_enabled || !self.ocr.is_available() {
            if self.config.ocr_enabled {
                warn!(backend = self.ocr.name(), "ocr backend not available");
            }
            return match direct {
                Ok(t) => Ok(pdf_result(path, t, TextKind::PdfText)),
                Err(message) => Err(ExtractionError::Pdf {
                    path: path.to_path_buf(),
                    message,
                }),
            };
        }

        match self.ocr_pdf(path, bytes) {
            Ok(ocr_text) => {
                info!(path = %path.display(), backend = self.ocr.name(), "extracted text via ocr");
                Ok(pdf_result(path, ocr_text, TextKind::PdfOcr))
            }
            Err(e) if chars > 0 => {
                warn!(path = %path.display(), error = %e, "ocr failed, keeping text layer");
                Ok(pdf_result(path, text.to_string(), TextKind::PdfText))
            }
            Err(source) => Err(ExtractionError::Ocr {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn ocr_pdf(&self, path: &Path, bytes: &[u8]) -> Result<String, OcrError> {
        let pages = pdf_page_count(bytes).ok_or_else(|| {
            OcrError::OcrFailed("could not determine the number of pages".to_string())
        })?;
        let mut text = String::new();
        for page in 1..=pages {
            text.push_str(&self.ocr.ocr_pdf_page(path, page)?);
            text.push('\n');
        }
        Ok(text)
    }
}

/// Extracts with the default Tesseract backend.
pub fn extract(path: &Path, config: &ExtractionConfig) -> Result<ExtractedText, ExtractionError> {
    Extractor::new(config.clone()).extract(path)
}

fn pdf_result(path: &Path, raw_text: String, kind: TextKind) -> ExtractedText {
    ExtractedText {
        source_path: path.to_path_buf(),
        raw_text,
        kind,
    }
}

#[cfg(feature = "pdf")]
fn pdf_text(bytes: &[u8]) -> Result<String, String> {
    // pdf-extract can panic on malformed fonts.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("pdf parser panicked".to_string()),
    }
}

#[cfg(not(feature = "pdf"))]
fn pdf_text(_bytes: &[u8]) -> Result<String, String> {
    Err("pdf support not compiled in".to_string())
}

#[cfg(feature = "pdf")]
pub(crate) fn pdf_page_count(bytes: &[u8]) -> Option<u32> {
    lopdf::Document::load_mem(bytes)
        .ok()
        .map(|doc| doc.get_pages().len() as u32)
}

#[cfg(not(feature = "pdf"))]
pub(crate) fn pdf_page_count(_bytes: &[u8]) -> Option<u32> {
    None
}

fn extract_csv(path: &Path, bytes: &[u8], sample_rows: usize) -> Result<ExtractedText, ExtractionError> {
    let csv_err = |message: String| ExtractionError::Csv {
        path: path.to_path_buf(),
        message,
    };
    let content = decode_text(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| csv_err(format!("failed to parse header row: {e}")))?
        .clone();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(csv_err("empty csv".to_string()));
    }

    let mut lines = vec![join_fields(&headers)];
    for (idx, record) in reader.records().take(sample_rows).enumerate() {
        match record {
            Ok(record) => lines.push(join_fields(&record)),
            Err(e) => warn!(path = %path.display(), row = idx + 1, error = %e, "skipping malformed csv row"),
        }
    }

    Ok(ExtractedText {
        source_path: path.to_path_buf(),
        raw_text: lines.join("\n"),
        kind: TextKind::CsvHeaders,
    })
}

fn join_fields(record: &csv::StringRecord) -> String {
    record
        .iter()
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// UTF-8 (BOM stripped) with an ISO-8859-1 fallback.
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}
