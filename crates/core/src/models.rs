use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextKind {
    PdfText,
    PdfOcr,
    CsvHeaders,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedText {
    pub source_path: PathBuf,
    pub raw_text: String,
    pub kind: TextKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamePlan {
    pub original_path: PathBuf,
    pub new_filename: String,
    pub new_path: PathBuf,
}
