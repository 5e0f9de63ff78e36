//! Resolving table state as of a past version or wall-clock time.
//!
//! Replay walks commits in ascending order and stops at the first commit the
//! cutoff excludes. Nothing from that commit is folded, including metadata it
//! carries, and the version is not advanced to it. A commit without a
//! `commitInfo` timestamp can never be excluded by a time cutoff.
use chrono::{DateTime, Utc};
use log::debug;

use crate::error::EngineResult;
use crate::transaction_log::actions::Commit;
use crate::transaction_log::log_reader::TransactionLog;
use crate::transaction_log::table_state::{LogReplay, TableState};

/// How far back in history to resolve a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cutoff {
    /// Fold commits up to and including this version.
    Version(u64),
    /// Fold commits whose commit time is at or before this instant.
    Timestamp(DateTime<Utc>),
}

impl Cutoff {
    /// Build a cutoff from the two optional request fields.
    ///
    /// When both are present the version wins.
    pub fn from_parts(version: Option<u64>, timestamp: Option<DateTime<Utc>>) -> Option<Self> {
        match (version, timestamp) {
            (Some(v), Some(ts)) => {
                debug!("both version {v} and timestamp {ts} given; using the version");
                Some(Cutoff::Version(v))
            }
            (Some(v), None) => Some(Cutoff::Version(v)),
            (None, Some(ts)) => Some(Cutoff::Timestamp(ts)),
            (None, None) => None,
        }
    }

    /// True when `version` is already past a version cutoff.
    ///
    /// Lets callers avoid reading commit files that cannot be folded.
    pub fn excludes_version(&self, version: u64) -> bool {
        matches!(self, Cutoff::Version(max) if version > *max)
    }

    /// True when replay must stop before folding `commit`.
    pub fn excludes(&self, commit: &Commit) -> bool {
        match self {
            Cutoff::Version(max) => commit.version > *max,
            Cutoff::Timestamp(at) => commit
                .timestamp()
                .is_some_and(|ts| ts > at.timestamp_millis()),
        }
    }
}

/// Fold `commits` (ascending) into a [`TableState`], honoring `cutoff`.
pub fn replay<'a>(
    commits: impl IntoIterator<Item = &'a Commit>,
    cutoff: Option<&Cutoff>,
) -> TableState {
    let mut replay = LogReplay::new();
    for commit in commits {
        if cutoff.is_some_and(|c| c.excludes(commit)) {
            break;
        }
        replay.fold(commit);
    }
    replay.finish()
}

impl TransactionLog {
    /// Rebuild the table state, optionally as of `cutoff`.
    ///
    /// Commits are read one at a time. With a version cutoff, commit files
    /// past it are never read; with a time cutoff, reading stops at the first
    /// commit that is too new.
    pub async fn table_state(&self, cutoff: Option<&Cutoff>) -> EngineResult<TableState> {
        let versions = self.list_commits().await?;
        let mut replay = LogReplay::new();

        for version in versions {
            if cutoff.is_some_and(|c| c.excludes_version(version)) {
                break;
            }
            let commit = self.load_commit(version).await?;
            if cutoff.is_some_and(|c| c.excludes(&commit)) {
                debug!(
                    "time cutoff excludes version {version}; stopping after {:?}",
                    replay.version()
                );
                break;
            }
            replay.fold(&commit);
        }

        let state = replay.finish();
        debug!(
            "resolved {} at version {} with {} active file(s)",
            self.location(),
            state.version_or_sentinel(),
            state.active_files.len()
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;
    use chrono::TimeZone;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn millis(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().expect("valid millis")
    }

    fn history() -> Vec<Commit> {
        commits(&[
            (0, vec![metadata("t"), add("a.json", 100), commit_info(1_000)]),
            (1, vec![remove("a.json"), add("b.json", 5), commit_info(2_000)]),
            (2, vec![add("c.json", 7), commit_info(3_000)]),
        ])
    }

    #[test]
    fn from_parts_prefers_version() {
        assert_eq!(
            Cutoff::from_parts(Some(3), Some(millis(1))),
            Some(Cutoff::Version(3))
        );
        assert_eq!(
            Cutoff::from_parts(None, Some(millis(1))),
            Some(Cutoff::Timestamp(millis(1)))
        );
        assert_eq!(Cutoff::from_parts(None, None), None);
    }

    #[test]
    fn latest_version_cutoff_equals_full_replay() {
        let log = history();
        assert_eq!(
            replay(&log, Some(&Cutoff::Version(2))),
            replay(&log, None)
        );
    }

    #[test]
    fn version_cutoff_never_exceeds_target() {
        let log = history();
        for n in 0..2 {
            let state = replay(&log, Some(&Cutoff::Version(n)));
            assert!(state.version.is_some_and(|v| v <= n));
        }
        let state = replay(&log, Some(&Cutoff::Version(0)));
        assert!(state.active_files.contains_key("a.json"));
        assert_eq!(state.version, Some(0));
    }

    #[test]
    fn version_cutoff_with_gap_uses_preceding_commit() {
        let log = commits(&[
            (0, vec![metadata("t"), add("a", 1)]),
            (5, vec![add("b", 1)]),
        ]);
        let state = replay(&log, Some(&Cutoff::Version(3)));
        assert_eq!(state.version, Some(0));
        assert_eq!(state.active_files.len(), 1);
    }

    #[test]
    fn timestamp_before_first_commit_is_empty() {
        let state = replay(&history(), Some(&Cutoff::Timestamp(millis(999))));
        assert_eq!(state.version_or_sentinel(), -1);
        assert!(state.active_files.is_empty());
        assert!(state.metadata.is_none());
    }

    #[test]
    fn timestamp_cutoff_excludes_newer_commits() {
        let state = replay(&history(), Some(&Cutoff::Timestamp(millis(2_500))));
        assert_eq!(state.version, Some(1));
        let mut paths: Vec<_> = state.active_files.keys().cloned().collect();
        paths.sort();
        assert_eq!(paths, vec!["b.json"]);

        // Inclusive at the exact commit time.
        let state = replay(&history(), Some(&Cutoff::Timestamp(millis(2_000))));
        assert_eq!(state.version, Some(1));
    }

    #[test]
    fn future_timestamp_equals_no_cutoff() {
        let log = history();
        assert_eq!(
            replay(&log, Some(&Cutoff::Timestamp(millis(i64::from(i32::MAX) * 1_000)))),
            replay(&log, None)
        );
    }

    #[test]
    fn commits_without_timestamp_are_always_folded() {
        let log = commits(&[
            (0, vec![metadata("t"), add("a", 1), commit_info(5_000)]),
            (1, vec![add("b", 1)]),
        ]);
        // v0 is too new, so replay stops before ever reaching v1.
        let state = replay(&log, Some(&Cutoff::Timestamp(millis(1_000))));
        assert_eq!(state.version, None);

        let log = commits(&[
            (0, vec![metadata("t"), add("a", 1)]),
            (1, vec![add("b", 1), commit_info(9_000)]),
        ]);
        let state = replay(&log, Some(&Cutoff::Timestamp(millis(1_000))));
        assert_eq!(state.version, Some(0));
        assert!(state.metadata.is_some());
    }

    #[tokio::test]
    async fn async_replay_matches_pure_replay() -> TestResult {
        let specs = [
            (0, vec![metadata("t"), add("a.json", 100), commit_info(1_000)]),
            (1, vec![remove("a.json"), commit_info(2_000)]),
        ];
        let log = TransactionLog::new(memory_table("tt", &specs)?);

        let full = log.table_state(None).await?;
        assert!(full.active_files.is_empty());
        assert_eq!(full.version, Some(1));

        let at_zero = log.table_state(Some(&Cutoff::Version(0))).await?;
        assert_eq!(at_zero.version, Some(0));
        assert!(at_zero.active_files.contains_key("a.json"));

        let pure = replay(&commits(&specs), Some(&Cutoff::Timestamp(millis(1_500))));
        let read = log
            .table_state(Some(&Cutoff::Timestamp(millis(1_500))))
            .await?;
        assert_eq!(read, pure);
        Ok(())
    }

    #[tokio::test]
    async fn version_cutoff_does_not_read_later_commits() -> TestResult {
        let backend = memory_table("lazy", &[(0, vec![metadata("t"), add("a", 1)])])?;
        // A listed but unreadable later commit would abort a full replay.
        backend.put(
            "_delta_log/00000000000000000001.json",
            bytes::Bytes::from_static(&[0xff, 0xfe]),
        )?;
        let log = TransactionLog::new(backend);

        let state = log.table_state(Some(&Cutoff::Version(0))).await?;
        assert_eq!(state.version, Some(0));
        assert!(log.table_state(None).await.is_err());
        Ok(())
    }
}
