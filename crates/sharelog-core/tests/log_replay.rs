//! End-to-end replay, time travel and change feed over tables on local disk.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use chrono::{TimeZone, Utc};
use sharelog_core::changes::{ChangeRange, ChangeType};
use sharelog_core::error::EngineError;
use sharelog_core::storage::{BackendRegistry, TableLocation};
use sharelog_core::table::SharedTable;
use sharelog_core::transaction_log::Cutoff;
use tempfile::TempDir;

use common::*;

fn open(root: &std::path::Path) -> TestResult<SharedTable> {
    let registry = BackendRegistry::new();
    Ok(SharedTable::open(&registry, &TableLocation::local(root))?)
}

/// v0: metadata + add a.json (100 bytes); v1: remove a.json.
fn add_then_remove(tmp: &TempDir) -> TestResult<SharedTable> {
    let root = table_root(tmp, "t")?;
    write_commit(
        &root,
        0,
        &[commit_info(1_000), metadata("t", &[]), add("a.json", 100)],
    )?;
    write_commit(&root, 1, &[commit_info(2_000), remove("a.json")])?;
    open(&root)
}

#[tokio::test]
async fn add_then_remove_replays_to_empty() -> TestResult {
    let tmp = TempDir::new()?;
    let table = add_then_remove(&tmp)?;

    let latest = table.state(None).await?;
    assert!(latest.active_files.is_empty());
    assert_eq!(latest.version, Some(1));

    let at_zero = table.state(Some(&Cutoff::Version(0))).await?;
    assert_eq!(at_zero.version, Some(0));
    assert_eq!(at_zero.active_files.len(), 1);
    assert_eq!(at_zero.active_files["a.json"].size, 100);
    Ok(())
}

#[tokio::test]
async fn add_then_remove_is_two_change_records() -> TestResult {
    let tmp = TempDir::new()?;
    let table = add_then_remove(&tmp)?;

    let set = table
        .changes(ChangeRange::from_parts(Some(0), Some(1), None, None))
        .await?;
    let records: Vec<_> = set
        .changes
        .iter()
        .map(|c| (c.path.as_str(), c.change_type, c.version))
        .collect();
    assert_eq!(
        records,
        vec![
            ("a.json", ChangeType::Add, 0),
            ("a.json", ChangeType::Remove, 1)
        ]
    );
    assert_eq!((set.start_version, set.end_version), (0, 1));
    assert_eq!(set.changes[1].timestamp, 2_000);
    Ok(())
}

#[tokio::test]
async fn latest_version_cutoff_matches_full_replay() -> TestResult {
    let tmp = TempDir::new()?;
    let table = add_then_remove(&tmp)?;

    assert_eq!(
        table.state(None).await?,
        table.state(Some(&Cutoff::Version(1))).await?
    );
    Ok(())
}

#[tokio::test]
async fn timestamp_before_first_commit_is_empty_and_unversioned() -> TestResult {
    let tmp = TempDir::new()?;
    let table = add_then_remove(&tmp)?;
    let before = Utc.timestamp_millis_opt(999).single().expect("valid");

    let state = table.state(Some(&Cutoff::Timestamp(before))).await?;
    assert_eq!(state.version_or_sentinel(), -1);
    assert!(state.active_files.is_empty());

    let err = table
        .state_with_metadata(Some(&Cutoff::Timestamp(before)))
        .await
        .expect_err("nothing folded");
    assert!(matches!(err, EngineError::MissingMetadata { version: -1, .. }));
    Ok(())
}

#[tokio::test]
async fn malformed_lines_and_stray_files_are_tolerated() -> TestResult {
    let tmp = TempDir::new()?;
    let root = table_root(&tmp, "messy")?;
    write_commit(&root, 0, &[metadata("m", &[]), add("a.json", 1)])?;
    let log_dir = root.join("_delta_log");
    std::fs::write(
        log_dir.join("00000000000000000001.json"),
        "{\"add\":{\"path\":\"b.json\",\"size\":2}}\n{truncated\n{\"txn\":{\"appId\":\"x\"}}\n",
    )?;
    std::fs::write(log_dir.join("00000000000000000002.crc"), "garbage")?;
    std::fs::write(log_dir.join("_last_checkpoint"), "{}")?;

    let state = open(&root)?.state(None).await?;
    assert_eq!(state.version, Some(1));
    assert_eq!(state.skipped_actions, 1);
    assert_eq!(state.active_files.len(), 2);
    Ok(())
}

#[tokio::test]
async fn table_without_commits_is_missing_log() -> TestResult {
    let tmp = TempDir::new()?;
    let root = table_root(&tmp, "empty")?;
    let table = open(&root)?;

    assert!(matches!(
        table.state(None).await,
        Err(EngineError::MissingLog { .. })
    ));
    assert!(matches!(
        table.changes(None).await,
        Err(EngineError::MissingLog { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn timestamp_change_window_over_disk_log() -> TestResult {
    let tmp = TempDir::new()?;
    let root = table_root(&tmp, "ts")?;
    write_commit(&root, 0, &[commit_info(1_000), metadata("t", &[]), add("a.json", 1)])?;
    write_commit(&root, 1, &[commit_info(2_000), add("b.json", 1)])?;
    write_commit(&root, 2, &[commit_info(3_000), add("c.json", 1)])?;
    let table = open(&root)?;

    let start = Utc.timestamp_millis_opt(1_500).single().expect("valid");
    let end = Utc.timestamp_millis_opt(2_500).single().expect("valid");
    let set = table
        .changes(ChangeRange::from_parts(None, None, Some(start), Some(end)))
        .await?;

    assert_eq!(set.changes.len(), 1);
    assert_eq!(set.changes[0].path, "b.json");
    assert_eq!((set.start_version, set.end_version), (1, 1));
    Ok(())
}
