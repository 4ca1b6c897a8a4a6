//! One unit of work per input file: extract, classify, name.
//!
//! Nothing here touches the destination; callers decide whether and how to
//! carry out the returned plan.

use crate::classifier::{self, ClassificationResult, ScoringOptions};
use crate::config::AppConfig;
use crate::extractor::Extractor;
use crate::models::{RenamePlan, TextKind};
use crate::renamer::{self, NamingOptions};
use crate::rules::RuleTable;
use anyhow::Context as _;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Classified,
    Unclassified,
    Ambiguous,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
    pub text_kind: Option<TextKind>,
    pub result: Option<ClassificationResult>,
    pub plan: Option<RenamePlan>,
    pub error: Option<String>,
}

impl FileReport {
    fn failed(path: &Path, error: String) -> Self {
        Self {
            path: path.to_path_buf(),
            status: FileStatus::Failed,
            text_kind: None,
            result: None,
            plan: None,
            error: Some(error),
        }
    }
}

/// Read-only state shared by every unit of work.
pub struct Context {
    pub rules: Arc<RuleTable>,
    pub extractor: Extractor,
    pub scoring: ScoringOptions,
    pub naming: NamingOptions,
    pub output_dir: PathBuf,
}

impl Context {
    pub fn new(
        rules: Arc<RuleTable>,
        extractor: Extractor,
        scoring: ScoringOptions,
        naming: NamingOptions,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            rules,
            extractor,
            scoring,
            naming,
            output_dir,
        }
    }

    pub fn from_config(
        cfg: &AppConfig,
        rules: Arc<RuleTable>,
        output_dir: PathBuf,
        today: NaiveDate,
    ) -> anyhow::Result<Self> {
        let naming = NamingOptions::from_config(&cfg.naming, today).context("naming options")?;
        Ok(Self::new(
            rules,
            Extractor::new(cfg.extraction.clone()),
            cfg.classification.clone(),
            naming,
            output_dir,
        ))
    }
}

/// Loads the configured rule table, or the built-in rules.
pub fn load_rules(cfg: &AppConfig) -> anyhow::Result<RuleTable> {
    match &cfg.rules.path {
        Some(path) => RuleTable::load_from_path(Path::new(path))
            .with_context(|| format!("loading rules from {path}")),
        None => RuleTable::builtin().context("loading built-in rules"),
    }
}

pub fn process_file(path: &Path, ctx: &Context) -> FileReport {
    let extracted = match ctx.extractor.extract(path) {
        Ok(e) => e,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "extraction failed");
            return FileReport::failed(path, e.to_string());
        }
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let result =
        classifier::classify_with_filename(&extracted.raw_text, &filename, &ctx.rules, &ctx.scoring);
    let status = if result.ambiguous {
        FileStatus::Ambiguous
    } else if result.matched_rule.is_some() {
        FileStatus::Classified
    } else {
        FileStatus::Unclassified
    };

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let (plan, error) = match renamer::build_name(&result, &ctx.naming, &extension) {
        Ok(name) => (Some(renamer::plan(path, name, &ctx.output_dir)), None),
        Err(e) => (None, Some(e.to_string())),
    };

    info!(
        path = %path.display(),
        status = ?status,
        code = result.matched_rule.as_ref().map(|r| r.code.as_str()).unwrap_or("-"),
        score = result.score,
        new_name = plan.as_ref().map(|p| p.new_filename.as_str()).unwrap_or("-"),
        "processed"
    );

    FileReport {
        path: path.to_path_buf(),
        status,
        text_kind: Some(extracted.kind),
        result: Some(result),
        plan,
        error,
    }
}
