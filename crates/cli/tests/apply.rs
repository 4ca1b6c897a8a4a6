use cli::fs_apply::{apply_plan, resolve_target, ApplyOutcome};
use docsort_core::config::{ConflictPolicy, TransferMode};
use docsort_core::renamer;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::tempdir;

#[test]
fn copy_creates_missing_output_dir() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("scan.pdf");
    fs::write(&src, b"pdf").unwrap();
    let out = temp.path().join("deep/out");
    let plan = renamer::plan(&src, "1001_Statement_2024.pdf".into(), &out);

    let outcome = apply_plan(&plan, TransferMode::Copy, ConflictPolicy::Rename).unwrap();
    assert_eq!(outcome, ApplyOutcome::Executed(out.join("1001_Statement_2024.pdf")));
    assert!(src.exists());
    assert_eq!(fs::read(out.join("1001_Statement_2024.pdf")).unwrap(), b"pdf");
}

#[test]
fn conflict_policies() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("in.csv");
    fs::write(&src, "new").unwrap();
    let out = temp.path().join("out");
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("x.csv"), "old").unwrap();
    let plan = renamer::plan(&src, "x.csv".into(), &out);

    assert_eq!(resolve_target(&plan, ConflictPolicy::Skip), None);
    assert_eq!(resolve_target(&plan, ConflictPolicy::Rename), Some(out.join("x_1.csv")));

    let skipped = apply_plan(&plan, TransferMode::Copy, ConflictPolicy::Skip).unwrap();
    assert!(matches!(skipped, ApplyOutcome::Skipped(_)));
    assert_eq!(fs::read_to_string(out.join("x.csv")).unwrap(), "old");

    let renamed = apply_plan(&plan, TransferMode::Copy, ConflictPolicy::Rename).unwrap();
    assert_eq!(renamed, ApplyOutcome::Executed(out.join("x_1.csv")));

    let overwritten = apply_plan(&plan, TransferMode::Move, ConflictPolicy::Overwrite).unwrap();
    assert_eq!(overwritten, ApplyOutcome::Executed(out.join("x.csv")));
    assert_eq!(fs::read_to_string(out.join("x.csv")).unwrap(), "new");
    assert!(!src.exists());
}

#[test]
fn same_source_and_target_is_skipped() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("x.csv");
    fs::write(&src, "data").unwrap();
    let plan = renamer::plan(&src, "x.csv".into(), temp.path());

    let outcome = apply_plan(&plan, TransferMode::Move, ConflictPolicy::Overwrite).unwrap();
    assert!(matches!(outcome, ApplyOutcome::Skipped(_)));
    assert_eq!(fs::read_to_string(&src).unwrap(), "data");
}

#[test]
fn missing_source_is_an_error() {
    let temp = tempdir().unwrap();
    let plan = renamer::plan(&temp.path().join("gone.csv"), "y.csv".into(), temp.path());
    assert!(apply_plan(&plan, TransferMode::Move, ConflictPolicy::Rename).is_err());
}
