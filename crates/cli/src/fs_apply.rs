use anyhow::{Context, Result};
use docsort_core::config::{ConflictPolicy, TransferMode};
use docsort_core::models::RenamePlan;
use docsort_core::renamer;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Executed(PathBuf),
    Skipped(String),
}

/// Carries out a rename plan. The source is left untouched in copy mode.
pub fn apply_plan(plan: &RenamePlan, mode: TransferMode, conflict: ConflictPolicy) -> Result<ApplyOutcome> {
    let target = resolve_target(plan, conflict);
    let Some(target) = target else {
        return Ok(ApplyOutcome::Skipped(format!(
            "{} already exists",
            plan.new_path.display()
        )));
    };
    if target == plan.original_path {
        return Ok(ApplyOutcome::Skipped("source and destination are the same".into()));
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    match mode {
        TransferMode::Copy => {
            fs::copy(&plan.original_path, &target).with_context(|| {
                format!("copying {} to {}", plan.original_path.display(), target.display())
            })?;
        }
        TransferMode::Move => move_file(&plan.original_path, &target)?,
    }
    Ok(ApplyOutcome::Executed(target))
}

/// Destination for the plan under the given policy, `None` when skipped.
pub fn resolve_target(plan: &RenamePlan, conflict: ConflictPolicy) -> Option<PathBuf> {
    if !plan.new_path.exists() {
        return Some(plan.new_path.clone());
    }
    match conflict {
        ConflictPolicy::Skip => None,
        ConflictPolicy::Overwrite => Some(plan.new_path.clone()),
        ConflictPolicy::Rename => Some(renamer::next_available(plan.clone(), Path::exists).new_path),
    }
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        // Cross-device moves fall back to copy then delete.
        Err(e) if e.kind() != ErrorKind::NotFound => {
            fs::copy(from, to)
                .with_context(|| format!("copying {} to {}", from.display(), to.display()))?;
            fs::remove_file(from).with_context(|| format!("removing {}", from.display()))?;
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("moving {}", from.display())),
    }
}
