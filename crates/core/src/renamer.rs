//! Output file naming.
//!
//! Names are rendered from a template such as
//! `{code}_{document_type}_{date}.{extension}` and are always a single path
//! component: separators, reserved characters and Windows device names never
//! survive into the result.

use crate::classifier::ClassificationResult;
use crate::config::NamingConfig;
use crate::error::NamingError;
use crate::models::RenamePlan;
use chrono::NaiveDate;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_TEMPLATE: &str = "{code}_{document_type}_{date}.{extension}";

const MAX_NAME_BYTES: usize = 255;
const RESERVED_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
const RESERVED_STEMS: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateFormat {
    #[default]
    Yyyy,
    Yymm,
    Yyyymm,
    Yyyymmdd,
}

impl DateFormat {
    pub fn format(&self, date: NaiveDate) -> String {
        let pattern = match self {
            DateFormat::Yyyy => "%Y",
            DateFormat::Yymm => "%y%m",
            DateFormat::Yyyymm => "%Y%m",
            DateFormat::Yyyymmdd => "%Y%m%d",
        };
        date.format(pattern).to_string()
    }
}

impl FromStr for DateFormat {
    type Err = NamingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "YYYY" => Ok(DateFormat::Yyyy),
            "YYMM" => Ok(DateFormat::Yymm),
            "YYYYMM" => Ok(DateFormat::Yyyymm),
            "YYYYMMDD" => Ok(DateFormat::Yyyymmdd),
            other => Err(NamingError::UnknownDateFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Code,
    DocumentType,
    Category,
    Date,
    Extension,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(Field),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingTemplate {
    segments: Vec<Segment>,
}

impl Default for NamingTemplate {
    fn default() -> Self {
        // The default template is known to parse.
        Self {
            segments: vec![
                Segment::Placeholder(Field::Code),
                Segment::Literal("_".into()),
                Segment::Placeholder(Field::DocumentType),
                Segment::Literal("_".into()),
                Segment::Placeholder(Field::Date),
                Segment::Literal(".".into()),
                Segment::Placeholder(Field::Extension),
            ],
        }
    }
}

impl FromStr for NamingTemplate {
    type Err = NamingError;

    fn from_str(template: &str) -> Result<Self, Self::Err> {
        if template.trim().is_empty() {
            return Err(NamingError::MalformedTemplate("template is empty".into()));
        }
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars();
        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => {
                                return Err(NamingError::MalformedTemplate(format!(
                                    "unclosed placeholder in {template:?}"
                                )))
                            }
                            Some(ch) => name.push(ch),
                        }
                    }
                    let field = match name.trim() {
                        "code" => Field::Code,
                        "document_type" | "display_name" => Field::DocumentType,
                        "category" => Field::Category,
                        "date" => Field::Date,
                        "extension" => Field::Extension,
                        other => {
                            return Err(NamingError::MalformedTemplate(format!(
                                "unknown placeholder {{{other}}}"
                            )))
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(field));
                }
                '}' => {
                    return Err(NamingError::MalformedTemplate(format!(
                        "unmatched '}}' in {template:?}"
                    )))
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }
}

#[derive(Debug, Clone)]
pub struct NamingOptions {
    pub template: NamingTemplate,
    /// Already formatted date text.
    pub date: String,
    pub require_code: bool,
    pub unclassified_code: String,
    pub unclassified_name: String,
}

impl NamingOptions {
    pub fn from_config(cfg: &NamingConfig, today: NaiveDate) -> Result<Self, NamingError> {
        let template = cfg.template.parse()?;
        let date = match cfg.custom_date.as_deref().map(str::trim) {
            Some(custom) if !custom.is_empty() => custom.to_string(),
            _ => cfg.date_format.parse::<DateFormat>()?.format(today),
        };
        Ok(Self {
            template,
            date,
            require_code: cfg.require_code,
            unclassified_code: cfg.unclassified_code.clone(),
            unclassified_name: cfg.unclassified_name.clone(),
        })
    }
}

/// Renders the file name for a classification result.
pub fn build_name(
    result: &ClassificationResult,
    opts: &NamingOptions,
    extension: &str,
) -> Result<String, NamingError> {
    let (code, document_type, category) = match &result.matched_rule {
        Some(rule) => (
            rule.code.as_str(),
            rule.display_name.as_str(),
            rule.category.as_str(),
        ),
        None if opts.require_code && result.ambiguous => {
            return Err(NamingError::Ambiguous(result.candidates.clone()))
        }
        None if opts.require_code => return Err(NamingError::Unclassified),
        None => (
            opts.unclassified_code.as_str(),
            opts.unclassified_name.as_str(),
            "general",
        ),
    };
    let extension = extension.trim().trim_start_matches('.');

    let mut name = String::new();
    for segment in &opts.template.segments {
        match segment {
            Segment::Literal(text) => name.push_str(text),
            Segment::Placeholder(field) => {
                let value = match field {
                    Field::Code => code,
                    Field::DocumentType => document_type,
                    Field::Category => category,
                    Field::Date => opts.date.as_str(),
                    Field::Extension => extension,
                };
                name.push_str(&sanitize_component(value.trim()));
            }
        }
    }
    finalize(&name)
}

/// Replaces reserved and control characters with `_`.
pub fn sanitize_component(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if RESERVED_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

fn finalize(name: &str) -> Result<String, NamingError> {
    let mut name = sanitize_component(name)
        .trim()
        .trim_end_matches(['.', ' '])
        .to_string();
    if name.is_empty() || name.chars().all(|c| c == '.' || c == '_') {
        return Err(NamingError::EmptyName);
    }
    let stem = name.split('.').next().unwrap_or_default().trim_end();
    if RESERVED_STEMS.contains(&stem.to_ascii_uppercase().as_str()) {
        name.insert(0, '_');
    }
    Ok(truncate(name))
}

// Keeps the extension and shortens the stem to fit common filesystem limits.
fn truncate(name: String) -> String {
    if name.len() <= MAX_NAME_BYTES {
        return name;
    }
    let (stem, ext) = split_extension(&name);
    join_fitted(stem, "", ext)
}

// `{stem}{suffix}.{ext}` with the stem cut on a char boundary so the whole
// name stays within MAX_NAME_BYTES.
fn join_fitted(stem: &str, suffix: &str, ext: Option<&str>) -> String {
    let reserved = suffix.len() + ext.map(|e| e.len() + 1).unwrap_or(0);
    let mut cut = MAX_NAME_BYTES.saturating_sub(reserved).min(stem.len());
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    match ext {
        Some(ext) => format!("{}{suffix}.{ext}", &stem[..cut]),
        None => format!("{}{suffix}", &stem[..cut]),
    }
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// `report.pdf` with `n = 2` becomes `report_2.pdf`.
/// The stem is shortened when needed so the result still fits the name limit.
pub fn with_suffix(name: &str, n: u32) -> String {
    let (stem, ext) = split_extension(name);
    join_fitted(stem, &format!("_{n}"), ext)
}

pub fn plan(original: &Path, new_filename: String, output_dir: &Path) -> RenamePlan {
    RenamePlan {
        original_path: original.to_path_buf(),
        new_path: output_dir.join(&new_filename),
        new_filename,
    }
}

/// Appends `_1`, `_2`, ... to the planned name until `exists` reports a
/// free destination.
pub fn next_available(plan: RenamePlan, exists: impl Fn(&Path) -> bool) -> RenamePlan {
    if !exists(&plan.new_path) {
        return plan;
    }
    let dir = plan
        .new_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut n = 1;
    loop {
        let candidate = with_suffix(&plan.new_filename, n);
        let path = dir.join(&candidate);
        if !exists(&path) {
            return RenamePlan {
                original_path: plan.original_path,
                new_filename: candidate,
                new_path: path,
            };
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Rule;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn matched(code: &str, name: &str) -> ClassificationResult {
        ClassificationResult {
            matched_rule: Some(Rule {
                code: code.to_string(),
                display_name: name.to_string(),
                keywords: vec!["k".to_string()],
                priority: 100,
                category: "billing".to_string(),
            }),
            score: 1,
            ..ClassificationResult::default()
        }
    }

    fn opts() -> NamingOptions {
        NamingOptions {
            template: NamingTemplate::default(),
            date: "2024".to_string(),
            require_code: false,
            unclassified_code: "9999".to_string(),
            unclassified_name: "Unclassified Document".to_string(),
        }
    }

    #[test]
    fn default_template_matches_parsed_default() {
        assert_eq!(
            DEFAULT_TEMPLATE.parse::<NamingTemplate>().unwrap(),
            NamingTemplate::default()
        );
    }

    #[test]
    fn renders_default_template() {
        let name = build_name(&matched("4001", "Invoice"), &opts(), "pdf").unwrap();
        assert_eq!(name, "4001_Invoice_2024.pdf");
        let name = build_name(&matched("4001", "Invoice"), &opts(), ".CSV").unwrap();
        assert_eq!(name, "4001_Invoice_2024.CSV");
    }

    #[test]
    fn date_formats() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(DateFormat::Yyyy.format(date), "2024");
        assert_eq!(DateFormat::Yymm.format(date), "2403");
        assert_eq!(DateFormat::Yyyymm.format(date), "202403");
        assert_eq!(DateFormat::Yyyymmdd.format(date), "20240307");
        assert_eq!("yyyymm".parse::<DateFormat>().unwrap(), DateFormat::Yyyymm);
        assert!(matches!(
            "DD-MM".parse::<DateFormat>(),
            Err(NamingError::UnknownDateFormat(_))
        ));
    }

    #[test]
    fn options_from_config_prefer_custom_date() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 2).unwrap();
        let mut cfg = NamingConfig {
            date_format: "YYMM".to_string(),
            ..NamingConfig::default()
        };
        assert_eq!(NamingOptions::from_config(&cfg, today).unwrap().date, "2511");
        cfg.custom_date = Some("FY25".to_string());
        assert_eq!(NamingOptions::from_config(&cfg, today).unwrap().date, "FY25");
    }

    #[test]
    fn unclassified_uses_fallback_unless_code_required() {
        let none = ClassificationResult::default();
        assert_eq!(
            build_name(&none, &opts(), "pdf").unwrap(),
            "9999_Unclassified Document_2024.pdf"
        );
        let strict = NamingOptions {
            require_code: true,
            ..opts()
        };
        assert!(matches!(
            build_name(&none, &strict, "pdf"),
            Err(NamingError::Unclassified)
        ));

        let tied = ClassificationResult {
            ambiguous: true,
            candidates: vec!["1".to_string(), "2".to_string()],
            score: 1,
            ..ClassificationResult::default()
        };
        assert!(matches!(
            build_name(&tied, &strict, "pdf"),
            Err(NamingError::Ambiguous(c)) if c == vec!["1", "2"]
        ));
    }

    #[test]
    fn custom_template_with_category() {
        let template: NamingTemplate = "{category}-{code} {display_name}.{extension}".parse().unwrap();
        let o = NamingOptions { template, ..opts() };
        assert_eq!(
            build_name(&matched("4001", "Invoice"), &o, "pdf").unwrap(),
            "billing-4001 Invoice.pdf"
        );
    }

    #[test]
    fn malformed_templates_rejected() {
        for bad in ["", "{code", "code}", "{code}_{nope}", "{{code}}"] {
            assert!(
                matches!(bad.parse::<NamingTemplate>(), Err(NamingError::MalformedTemplate(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn never_contains_path_separators() {
        let nasty = [
            "../../etc/passwd",
            "a/b\\c",
            "C:\\Windows\\System32",
            "tab\tand\nnewline",
            "what?<is>|this*\"",
            "/",
        ];
        for display in nasty {
            let name = build_name(&matched("1/2", display), &opts(), "p/df").unwrap();
            assert!(!name.contains('/') && !name.contains('\\'), "{name}");
            assert!(!name.chars().any(|c| RESERVED_CHARS.contains(&c) || c.is_control()));
        }
        let template: NamingTemplate = "../{code}/x.{extension}".parse().unwrap();
        let o = NamingOptions { template, ..opts() };
        let name = build_name(&matched("1", "A"), &o, "pdf").unwrap();
        assert_eq!(name, ".._1_x.pdf");
    }

    #[test]
    fn reserved_device_names_are_prefixed() {
        let template: NamingTemplate = "{document_type}.{extension}".parse().unwrap();
        let o = NamingOptions { template, ..opts() };
        assert_eq!(build_name(&matched("1", "con"), &o, "pdf").unwrap(), "_con.pdf");
        assert_eq!(build_name(&matched("1", "console"), &o, "pdf").unwrap(), "console.pdf");
    }

    #[test]
    fn trailing_dots_trimmed_and_empty_rejected() {
        let template: NamingTemplate = "{code}.{extension}".parse().unwrap();
        let o = NamingOptions { template, ..opts() };
        assert_eq!(build_name(&matched("7", "x"), &o, "").unwrap(), "7");
        assert!(matches!(
            build_name(&matched("..", "x"), &o, ""),
            Err(NamingError::EmptyName)
        ));
    }

    #[test]
    fn long_names_truncated_keeping_extension() {
        let long = "é".repeat(300);
        let name = build_name(&matched("1", &long), &opts(), "pdf").unwrap();
        assert!(name.len() <= MAX_NAME_BYTES);
        assert!(name.ends_with(".pdf"));
    }

    #[test]
    fn suffixed_names_stay_within_limit() {
        let long = "é".repeat(300);
        let name = build_name(&matched("1", &long), &opts(), "pdf").unwrap();
        let taken = plan(Path::new("in.pdf"), name, Path::new("out"));
        let first = taken.new_path.clone();

        let next = next_available(taken, |p| p == first);
        assert!(next.new_filename.len() <= MAX_NAME_BYTES);
        assert!(next.new_filename.ends_with("_1.pdf"));
        assert_eq!(next.new_path, Path::new("out").join(&next.new_filename));

        let ascii = format!("{}.csv", "a".repeat(251));
        assert_eq!(ascii.len(), MAX_NAME_BYTES);
        let suffixed = with_suffix(&ascii, 12);
        assert_eq!(suffixed.len(), MAX_NAME_BYTES);
        assert!(suffixed.ends_with("a_12.csv"));
    }

    #[test]
    fn suffixes() {
        assert_eq!(with_suffix("a.pdf", 1), "a_1.pdf");
        assert_eq!(with_suffix("a.b.csv", 2), "a.b_2.csv");
        assert_eq!(with_suffix("noext", 3), "noext_3");
    }

    #[test]
    fn next_available_skips_taken_names() {
        let out = PathBuf::from("/out");
        let taken: HashSet<PathBuf> = [out.join("4001_Invoice_2024.pdf"), out.join("4001_Invoice_2024_1.pdf")]
            .into_iter()
            .collect();
        let p = plan(Path::new("/in/scan.pdf"), "4001_Invoice_2024.pdf".to_string(), &out);
        let resolved = next_available(p, |path| taken.contains(path));
        assert_eq!(resolved.new_filename, "4001_Invoice_2024_2.pdf");
        assert_eq!(resolved.new_path, out.join("4001_Invoice_2024_2.pdf"));
        assert_eq!(resolved.original_path, PathBuf::from("/in/scan.pdf"));

        let free = plan(Path::new("/in/a.csv"), "x.csv".to_string(), &out);
        assert_eq!(next_available(free.clone(), |_| false), free);
    }
}
