use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported file type: {0}")]
    Unsupported(PathBuf),
    #[error("pdf extraction failed for {path}: {message}")]
    Pdf { path: PathBuf, message: String },
    #[error("ocr failed for {path}: {source}")]
    Ocr {
        path: PathBuf,
        #[source]
        source: OcrError,
    },
    #[error("csv extraction failed for {path}: {message}")]
    Csv { path: PathBuf, message: String },
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("ocr backend not available: {0}")]
    BackendNotAvailable(String),
    #[error("ocr failed: {0}")]
    OcrFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("no rule matched and a classification code is required")]
    Unclassified,
    #[error("classification is ambiguous between {0:?}")]
    Ambiguous(Vec<String>),
    #[error("malformed naming template: {0}")]
    MalformedTemplate(String),
    #[error("template produced an empty file name")]
    EmptyName,
    #[error("unknown date format: {0}")]
    UnknownDateFormat(String),
}

#[derive(Debug, Error)]
pub enum RuleTableError {
    #[error("duplicate rule code: {0}")]
    DuplicateCode(String),
    #[error("rule {0} has no keywords")]
    EmptyKeywords(String),
    #[error("rule {code} has a blank {field}")]
    BlankField { code: String, field: &'static str },
    #[error("failed to parse rules from {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("failed to read rules from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("pdf splitting is not available in this build")]
    NotAvailable,
    #[error("failed to split {path}: {message}")]
    Pdf { path: PathBuf, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
