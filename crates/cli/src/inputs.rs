//! Expands command-line paths into the list of documents to process.

use anyhow::Context;
use docsort_core::config::ScanConfig;
use docsort_core::extractor::DocumentType;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Files given explicitly are kept whatever their type so that unsupported
/// ones show up as per-file failures. Directories contribute only PDF and
/// CSV files.
pub fn collect_inputs(paths: &[PathBuf], scan: &ScanConfig) -> anyhow::Result<Vec<PathBuf>> {
    let excludes = build_globset(&scan.exclude)?;
    let mut found = BTreeSet::new();

    for root in paths {
        if !root.is_dir() {
            found.insert(root.clone());
            continue;
        }
        let max_depth = if scan.recursive { usize::MAX } else { 1 };
        for entry in WalkDir::new(root)
            .follow_links(true)
            .max_depth(max_depth)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || should_descend(e.path(), scan.include_hidden, &excludes))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            if entry.file_type().is_file() && DocumentType::from_path(path).is_some() {
                found.insert(path.to_path_buf());
            }
        }
    }
    Ok(found.into_iter().collect())
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        builder.add(Glob::new(pat).with_context(|| format!("invalid exclude pattern {pat:?}"))?);
    }
    Ok(builder.build()?)
}

fn should_descend(path: &Path, include_hidden: bool, excludes: &GlobSet) -> bool {
    if excludes.is_match(path) {
        return false;
    }
    include_hidden || !is_hidden(path)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}
