use crate::classifier::ScoringOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rules: RuleConfig,
    pub scan: ScanConfig,
    pub extraction: ExtractionConfig,
    pub classification: ScoringOptions,
    pub naming: NamingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// A rules `.toml` file or a directory of them; built-in rules when unset.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub exclude: Vec<String>,
    pub recursive: bool,
    pub include_hidden: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            recursive: true,
            include_hidden: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub ocr_enabled: bool,
    /// Direct PDF text shorter than this (trimmed, in chars) triggers OCR.
    pub min_text_len: usize,
    pub csv_sample_rows: usize,
    pub ocr_language: String,
    pub ocr_dpi: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            min_text_len: 50,
            csv_sample_rows: 5,
            ocr_language: "eng".to_string(),
            ocr_dpi: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub template: String,
    /// One of YYYY, YYMM, YYYYMM, YYYYMMDD.
    pub date_format: String,
    /// Literal date text used instead of today's date.
    pub custom_date: Option<String>,
    pub require_code: bool,
    pub unclassified_code: String,
    pub unclassified_name: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            template: crate::renamer::DEFAULT_TEMPLATE.to_string(),
            date_format: "YYYY".to_string(),
            custom_date: None,
            require_code: false,
            unclassified_code: "9999".to_string(),
            unclassified_name: "Unclassified Document".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMode {
    #[default]
    Copy,
    Move,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Append `_1`, `_2`, ... until the name is free.
    #[default]
    Rename,
    Skip,
    Overwrite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: Option<String>,
    pub mode: TransferMode,
    pub conflict: ConflictPolicy,
    pub dry_run: bool,
    pub split_pdfs: bool,
    pub jobs: Option<usize>,
}

/// Loads configuration from `path`, or `config/default` when present.
/// `DOCSORT__SECTION__KEY` environment variables override file values.
pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("config/default").required(false));
    }
    settings = settings.add_source(
        config::Environment::with_prefix("DOCSORT").separator("__"),
    );
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}
