//! Runs units of work over many files.
//!
//! Extraction and classification run on the blocking pool, several files at
//! a time. Applying plans is serialized so that conflict resolution sees the
//! files written by earlier plans.

use crate::fs_apply::{self, ApplyOutcome};
use anyhow::Result;
use docsort_core::config::{ConflictPolicy, TransferMode};
use docsort_core::extractor::DocumentType;
use docsort_core::pipeline::{self, Context, FileReport, FileStatus};
use docsort_core::split;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub mode: TransferMode,
    pub conflict: ConflictPolicy,
    pub dry_run: bool,
    pub split_pdfs: bool,
    pub jobs: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            mode: TransferMode::Copy,
            conflict: ConflictPolicy::Rename,
            dry_run: false,
            split_pdfs: false,
            jobs: default_jobs(),
        }
    }
}

pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ApplyStatus {
    /// No plan was produced.
    None,
    DryRun,
    Executed { to: PathBuf },
    Skipped { reason: String },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    #[serde(flatten)]
    pub report: FileReport,
    /// Set for pages produced by splitting a multi-page PDF.
    pub split_from: Option<PathBuf>,
    pub apply: ApplyStatus,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub classified: usize,
    pub unclassified: usize,
    pub ambiguous: usize,
    pub failed: usize,
    pub executed: usize,
    pub skipped: usize,
    pub apply_errors: usize,
}

impl BatchSummary {
    pub fn from_entries(entries: &[BatchEntry]) -> Self {
        let mut s = BatchSummary {
            total: entries.len(),
            ..BatchSummary::default()
        };
        for entry in entries {
            match entry.report.status {
                FileStatus::Classified => s.classified += 1,
                FileStatus::Unclassified => s.unclassified += 1,
                FileStatus::Ambiguous => s.ambiguous += 1,
                FileStatus::Failed => s.failed += 1,
            }
            match entry.apply {
                ApplyStatus::Executed { .. } => s.executed += 1,
                ApplyStatus::Skipped { .. } => s.skipped += 1,
                ApplyStatus::Error { .. } => s.apply_errors += 1,
                ApplyStatus::None | ApplyStatus::DryRun => {}
            }
        }
        s
    }
}

/// Processes every file; a failing file never stops the others. Entries come
/// back in input order.
pub async fn run_batch(
    files: Vec<PathBuf>,
    ctx: Arc<Context>,
    opts: BatchOptions,
) -> Result<Vec<BatchEntry>> {
    let permits = Arc::new(Semaphore::new(opts.jobs.max(1)));
    let apply_lock = Arc::new(Mutex::new(()));
    let opts = Arc::new(opts);
    let mut set = JoinSet::new();

    for (idx, path) in files.into_iter().enumerate() {
        let permit = permits.clone().acquire_owned().await?;
        let ctx = ctx.clone();
        let opts = opts.clone();
        let lock = apply_lock.clone();
        set.spawn_blocking(move || {
            let entries = process_unit(&path, &ctx, &opts, &lock);
            drop(permit);
            (idx, entries)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(r) => results.push(r),
            Err(e) => error!(error = %e, "worker task failed"),
        }
    }
    results.sort_by_key(|(idx, _)| *idx);
    Ok(results.into_iter().flat_map(|(_, e)| e).collect())
}

fn process_unit(path: &Path, ctx: &Context, opts: &BatchOptions, lock: &Mutex<()>) -> Vec<BatchEntry> {
    if opts.split_pdfs && DocumentType::from_path(path) == Some(DocumentType::Pdf) {
        match split_and_process(path, ctx, opts, lock) {
            Ok(Some(entries)) => return entries,
            Ok(None) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "split failed, processing whole file"),
        }
    }
    let report = pipeline::process_file(path, ctx);
    let apply = apply_report(&report, opts.mode, opts, lock);
    vec![BatchEntry {
        report,
        split_from: None,
        apply,
    }]
}

// Returns None for single-page documents, which are handled as a whole.
fn split_and_process(
    path: &Path,
    ctx: &Context,
    opts: &BatchOptions,
    lock: &Mutex<()>,
) -> Result<Option<Vec<BatchEntry>>> {
    let work = tempfile::tempdir()?;
    let pages = split::split_pdf(path, work.path(), "page")?;
    if pages.len() < 2 {
        return Ok(None);
    }
    info!(path = %path.display(), pages = pages.len(), "split into pages");

    let mut entries = Vec::with_capacity(pages.len());
    for page in pages {
        let report = pipeline::process_file(&page, ctx);
        // Page files live in a scratch directory, so they are always moved.
        let apply = apply_report(&report, TransferMode::Move, opts, lock);
        entries.push(BatchEntry {
            report,
            split_from: Some(path.to_path_buf()),
            apply,
        });
    }

    let all_done = entries
        .iter()
        .all(|e| matches!(e.apply, ApplyStatus::Executed { .. }));
    if opts.mode == TransferMode::Move && !opts.dry_run && all_done {
        std::fs::remove_file(path)?;
    }
    Ok(Some(entries))
}

fn apply_report(report: &FileReport, mode: TransferMode, opts: &BatchOptions, lock: &Mutex<()>) -> ApplyStatus {
    let Some(plan) = &report.plan else {
        return ApplyStatus::None;
    };
    if opts.dry_run {
        return ApplyStatus::DryRun;
    }
    let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    match fs_apply::apply_plan(plan, mode, opts.conflict) {
        Ok(ApplyOutcome::Executed(to)) => ApplyStatus::Executed { to },
        Ok(ApplyOutcome::Skipped(reason)) => ApplyStatus::Skipped { reason },
        Err(e) => {
            warn!(path = %plan.original_path.display(), error = %e, "apply failed");
            ApplyStatus::Error {
                message: format!("{e:#}"),
            }
        }
    }
}
