//! Change data feed: the ledger of file-level changes between two points.
//!
//! Unlike replay, extraction does not fold commits into a current state. It
//! walks the same ascending commit sequence and emits one [`ChangeRecord`]
//! per `add`, `remove` and `cdc` action of every commit inside the requested
//! window. Records are never deduplicated: a file added at v0 and removed at
//! v1 shows up twice.
//!
//! Window rules, per commit in ascending order:
//!
//! - The boundary key is the commit version for a version range and the
//!   `commitInfo` timestamp for a timestamp range.
//! - `found_start` flips to true at the first commit whose key reaches the
//!   start bound, and immediately when there is no start bound.
//! - The first commit whose key is past the end bound stops the walk; later
//!   commits are never read.
//! - A commit with no key (timestamp range, no `commitInfo`) neither flips
//!   `found_start` nor stops the walk. It is included iff `found_start` holds.
//!
//! An `add` whose path sits under the change-data directory is reclassified
//! as [`ChangeType::Cdf`], by correcting the last record of the current commit
//! with exactly that path.
use std::ops::ControlFlow;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::transaction_log::layout::is_change_data_path;
use crate::transaction_log::{
    Action, Commit, Metadata, PartitionValues, Protocol, TransactionLog,
};

/// Kind of change a [`ChangeRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// A data file was added.
    Add,
    /// A data file was removed.
    Remove,
    /// A file holding row-level change data.
    Cdf,
}

impl ChangeType {
    /// Wire key of a change line (`add`, `remove` or `cdf`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Add => "add",
            ChangeType::Remove => "remove",
            ChangeType::Cdf => "cdf",
        }
    }
}

/// One file-level change, tagged with the commit it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// File path relative to the table root.
    pub path: String,
    /// File size in bytes (0 when a remove did not record it).
    pub size: u64,
    /// Version of the owning commit.
    pub version: u64,
    /// Action time, else commit time, else 0; epoch milliseconds.
    pub timestamp: i64,
    /// Kind of change.
    pub change_type: ChangeType,
    /// Partition values, when the action carried them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_values: Option<PartitionValues>,
    /// Serialized file statistics, when the action carried them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<String>,
}

/// Result of a change extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Last metadata seen in any scanned commit.
    pub metadata: Option<Metadata>,
    /// Last protocol seen in any scanned commit.
    pub protocol: Option<Protocol>,
    /// Changes in commit order, then action order.
    pub changes: Vec<ChangeRecord>,
    /// Lowest included version, 0 when nothing matched.
    pub start_version: u64,
    /// Highest included version, 0 when nothing matched.
    pub end_version: u64,
}

/// Window of commits to extract changes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeRange {
    /// Inclusive version bounds.
    Versions {
        /// First version to include.
        start: Option<u64>,
        /// Last version to include.
        end: Option<u64>,
    },
    /// Inclusive commit-time bounds.
    Timestamps {
        /// Earliest commit time to include.
        start: Option<DateTime<Utc>>,
        /// Latest commit time to include.
        end: Option<DateTime<Utc>>,
    },
}

/// Where a commit sits relative to a range's bounds.
struct Position {
    reached_start: bool,
    past_end: bool,
}

impl ChangeRange {
    /// Build a range from the four optional request fields.
    ///
    /// Any version bound selects a version range, and the timestamps are then
    /// ignored. Returns `None` when no bound is given at all.
    pub fn from_parts(
        starting_version: Option<u64>,
        ending_version: Option<u64>,
        starting_timestamp: Option<DateTime<Utc>>,
        ending_timestamp: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        if starting_version.is_some() || ending_version.is_some() {
            if starting_timestamp.is_some() || ending_timestamp.is_some() {
                debug!("version and timestamp range both given; using the versions");
            }
            return Some(ChangeRange::Versions {
                start: starting_version,
                end: ending_version,
            });
        }
        if starting_timestamp.is_some() || ending_timestamp.is_some() {
            return Some(ChangeRange::Timestamps {
                start: starting_timestamp,
                end: ending_timestamp,
            });
        }
        None
    }

    fn has_start(&self) -> bool {
        match self {
            ChangeRange::Versions { start, .. } => start.is_some(),
            ChangeRange::Timestamps { start, .. } => start.is_some(),
        }
    }

    /// Locate `commit` against the bounds; `None` when its key is unknown.
    fn position(&self, commit: &Commit) -> Option<Position> {
        match self {
            ChangeRange::Versions { start, end } => {
                let v = commit.version;
                Some(Position {
                    reached_start: start.is_none_or(|s| v >= s),
                    past_end: end.is_some_and(|e| v > e),
                })
            }
            ChangeRange::Timestamps { start, end } => {
                let ts = commit.timestamp()?;
                Some(Position {
                    reached_start: start.is_none_or(|s| ts >= s.timestamp_millis()),
                    past_end: end.is_some_and(|e| ts > e.timestamp_millis()),
                })
            }
        }
    }
}

/// Incremental extractor; feed commits in ascending order, then `finish`.
#[derive(Debug)]
pub struct ChangeExtractor {
    range: Option<ChangeRange>,
    found_start: bool,
    set: ChangeSet,
    bounds: Option<(u64, u64)>,
}

impl ChangeExtractor {
    /// Create an extractor over `range` (`None` includes every commit).
    pub fn new(range: Option<ChangeRange>) -> Self {
        Self {
            found_start: range.as_ref().is_none_or(|r| !r.has_start()),
            range,
            set: ChangeSet::default(),
            bounds: None,
        }
    }

    /// Process one commit. `Break` means no later commit can qualify.
    pub fn visit(&mut self, commit: &Commit) -> ControlFlow<()> {
        if let Some(range) = &self.range {
            match range.position(commit) {
                Some(pos) if pos.past_end => return ControlFlow::Break(()),
                Some(pos) if pos.reached_start => self.found_start = true,
                _ => {}
            }
        }

        let commit_ts = commit.timestamp();
        let first_of_commit = self.set.changes.len();
        let include = self.found_start;

        for action in &commit.actions {
            match action {
                Action::Metadata(meta) => self.set.metadata = Some(meta.clone()),
                Action::Protocol(protocol) => self.set.protocol = Some(protocol.clone()),
                Action::Add(add) if include => {
                    self.set.changes.push(ChangeRecord {
                        path: add.path.clone(),
                        size: add.size,
                        version: commit.version,
                        timestamp: action_time(Some(add.modification_time), commit_ts),
                        change_type: ChangeType::Add,
                        partition_values: Some(add.partition_values.clone()),
                        stats: add.stats.clone(),
                    });
                    if is_change_data_path(&add.path) {
                        self.reclassify_last(first_of_commit, &add.path);
                    }
                }
                Action::Remove(remove) if include => {
                    self.set.changes.push(ChangeRecord {
                        path: remove.path.clone(),
                        size: remove.size.unwrap_or(0),
                        version: commit.version,
                        timestamp: action_time(remove.deletion_timestamp, commit_ts),
                        change_type: ChangeType::Remove,
                        partition_values: remove.partition_values.clone(),
                        stats: None,
                    });
                }
                Action::Cdc(cdc) if include => {
                    self.set.changes.push(ChangeRecord {
                        path: cdc.path.clone(),
                        size: cdc.size,
                        version: commit.version,
                        timestamp: action_time(None, commit_ts),
                        change_type: ChangeType::Cdf,
                        partition_values: Some(cdc.partition_values.clone()),
                        stats: None,
                    });
                }
                _ => {}
            }
        }

        if include {
            self.bounds = Some(match self.bounds {
                Some((lo, hi)) => (lo.min(commit.version), hi.max(commit.version)),
                None => (commit.version, commit.version),
            });
        }
        ControlFlow::Continue(())
    }

    /// Last-matching-record correction, limited to the current commit.
    fn reclassify_last(&mut self, first_of_commit: usize, path: &str) {
        if let Some(record) = self.set.changes[first_of_commit..]
            .iter_mut()
            .rev()
            .find(|r| r.path == path)
        {
            record.change_type = ChangeType::Cdf;
        }
    }

    /// Finish and return the accumulated change set.
    pub fn finish(self) -> ChangeSet {
        let (start_version, end_version) = self.bounds.unwrap_or((0, 0));
        ChangeSet {
            start_version,
            end_version,
            ..self.set
        }
    }
}

/// Own time if set (non-zero), else commit time, else 0.
fn action_time(own: Option<i64>, commit_ts: Option<i64>) -> i64 {
    own.filter(|t| *t != 0).or(commit_ts).unwrap_or(0)
}

/// Extract changes from in-memory commits (ascending).
pub fn extract_changes<'a>(
    commits: impl IntoIterator<Item = &'a Commit>,
    range: Option<ChangeRange>,
) -> ChangeSet {
    let mut extractor = ChangeExtractor::new(range);
    for commit in commits {
        if extractor.visit(commit).is_break() {
            break;
        }
    }
    extractor.finish()
}

impl TransactionLog {
    /// Extract the change data feed over `range`.
    ///
    /// Fails with `MissingLog` for an empty log. Commits past the end bound
    /// are not read.
    pub async fn changes(&self, range: Option<ChangeRange>) -> EngineResult<ChangeSet> {
        let versions = self.list_commits().await?;
        let mut extractor = ChangeExtractor::new(range);

        for version in versions {
            let commit = self.load_commit(version).await?;
            if extractor.visit(&commit).is_break() {
                debug!("change range ends before version {version}");
                break;
            }
        }

        let set = extractor.finish();
        debug!(
            "extracted {} change(s) from {} covering versions {}..={}",
            set.changes.len(),
            self.location(),
            set.start_version,
            set.end_version
        );
        Ok(set)
    }
}
