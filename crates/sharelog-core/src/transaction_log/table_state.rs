//! Reconstructing table state by replaying log commits.
//!
//! `TableState` is the fold of every commit up to some cutoff: the live data
//! files keyed by path, the last metadata and protocol seen, and the version
//! of the last commit folded. It is never persisted and never cached; every
//! read rebuilds it from the commit listing.
//!
//! [`LogReplay`] is the pure folding step. It knows nothing about storage or
//! cutoffs, which keeps the replay rules testable on in-memory commits.
use std::collections::HashMap;

use crate::transaction_log::actions::{Action, AddFile, Commit, Metadata, Protocol};

/// In-memory view of a table reconstructed from the log.
///
/// Invariant: every path in `active_files` was added by a folded commit and
/// was not removed by a later folded commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableState {
    /// Version of the last folded commit; `None` when nothing was folded.
    pub version: Option<u64>,
    /// Last metadata action seen (last write wins, never merged).
    pub metadata: Option<Metadata>,
    /// Last protocol action seen.
    pub protocol: Option<Protocol>,
    /// Live data files keyed by path.
    pub active_files: HashMap<String, AddFile>,
    /// Last `commitInfo` timestamp seen, epoch milliseconds.
    pub latest_commit_timestamp: Option<i64>,
    /// Malformed lines skipped across all folded commits.
    pub skipped_actions: usize,
}

impl TableState {
    /// Version as reported on the wire, `-1` when no commit was folded.
    pub fn version_or_sentinel(&self) -> i64 {
        self.version
            .and_then(|v| i64::try_from(v).ok())
            .unwrap_or(-1)
    }

    /// Active files ordered by path.
    pub fn files_sorted_by_path(&self) -> Vec<&AddFile> {
        let mut files: Vec<&AddFile> = self.active_files.values().collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// Active files in the order reads and manifests enumerate them.
    pub fn files_in_order(&self, sort_by_path: bool) -> Vec<&AddFile> {
        if sort_by_path {
            self.files_sorted_by_path()
        } else {
            self.active_files.values().collect()
        }
    }

    /// Total bytes across active files.
    pub fn total_size(&self) -> u64 {
        self.active_files.values().map(|f| f.size).sum()
    }

    /// Total record count from file statistics; `None` if any file lacks them.
    pub fn num_records(&self) -> Option<u64> {
        self.active_files
            .values()
            .map(|f| f.parsed_stats().and_then(|s| s.num_records))
            .sum()
    }
}

/// Folds commits, in ascending version order, into a [`TableState`].
#[derive(Debug, Default)]
pub struct LogReplay {
    state: TableState,
}

impl LogReplay {
    /// Start from the empty state (`version None`, no files, no metadata).
    pub fn new() -> Self {
        Self::default()
    }

    /// Version of the last folded commit so far.
    pub fn version(&self) -> Option<u64> {
        self.state.version
    }

    /// Apply every action of `commit` and advance the version to it.
    pub fn fold(&mut self, commit: &Commit) {
        let state = &mut self.state;
        for action in &commit.actions {
            match action {
                Action::Metadata(meta) => state.metadata = Some(meta.clone()),
                Action::Protocol(protocol) => state.protocol = Some(protocol.clone()),
                Action::Add(add) => {
                    state.active_files.insert(add.path.clone(), add.clone());
                }
                Action::Remove(remove) => {
                    // Removing an unknown path is a no-op.
                    state.active_files.remove(&remove.path);
                }
                Action::CommitInfo(info) => {
                    if let Some(ts) = info.timestamp {
                        state.latest_commit_timestamp = Some(ts);
                    }
                }
                Action::Cdc(_) => {}
            }
        }
        state.skipped_actions += commit.skipped_lines;
        state.version = Some(commit.version);
    }

    /// Finish replay and return the accumulated state.
    pub fn finish(self) -> TableState {
        self.state
    }
}
