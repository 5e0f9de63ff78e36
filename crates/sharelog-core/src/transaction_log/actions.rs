//! Log actions and commit payload definitions.
//!
//! A commit file is newline-delimited JSON: each line holds exactly one action
//! object keyed by its kind (`{"add": {...}}`, `{"metaData": {...}}`, ...).
//! [`Commit::parse`] turns a file into ordered [`Action`] values, skipping
//! lines it cannot understand instead of failing the whole commit.
use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Partition column name to serialized value (`None` for a null partition).
pub type PartitionValues = HashMap<String, Option<String>>;

fn default_true() -> bool {
    true
}

fn default_provider() -> String {
    "parquet".to_string()
}

/// Accept stats written either as the canonical JSON string or as an inline object.
fn deserialize_stats<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Minimum protocol versions required to read the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    /// Minimum reader protocol version.
    pub min_reader_version: u32,
    /// Minimum writer protocol version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_writer_version: Option<u32>,
}

impl Default for Protocol {
    fn default() -> Self {
        Self {
            min_reader_version: 1,
            min_writer_version: None,
        }
    }
}

/// Storage format of the table's data files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Format {
    /// Format name, for example `parquet`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Format-specific options.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub options: HashMap<String, String>,
}

impl Default for Format {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            options: HashMap::new(),
        }
    }
}

/// Table identity and schema. A later metadata action replaces an earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Unique table id.
    pub id: String,
    /// Optional user-facing name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Data file format.
    #[serde(default)]
    pub format: Format,
    /// Column schema serialized as a JSON struct type.
    #[serde(default)]
    pub schema_string: String,
    /// Names of the partition columns, in order.
    #[serde(default)]
    pub partition_columns: Vec<String>,
    /// Table properties.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub configuration: HashMap<String, String>,
    /// Creation time in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,
}

/// A data file entering the active set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFile {
    /// Path relative to the table root; unique key within the table.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// Partition values of every row in the file.
    #[serde(default)]
    pub partition_values: PartitionValues,
    /// Modification time in epoch milliseconds.
    #[serde(default)]
    pub modification_time: i64,
    /// Whether the add changes table data (false for pure rearrangements).
    #[serde(default = "default_true")]
    pub data_change: bool,
    /// Serialized [`FileStats`].
    #[serde(
        default,
        deserialize_with = "deserialize_stats",
        skip_serializing_if = "Option::is_none"
    )]
    pub stats: Option<String>,
    /// Free-form tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
}

impl AddFile {
    /// Decode the serialized statistics, if present and well-formed.
    pub fn parsed_stats(&self) -> Option<FileStats> {
        let raw = self.stats.as_deref()?;
        match serde_json::from_str(raw) {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!("ignoring unparsable stats for {}: {e}", self.path);
                None
            }
        }
    }
}

/// A data file leaving the active set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFile {
    /// Path of the previously added file.
    pub path: String,
    /// Deletion time in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<i64>,
    /// Whether the removal changes table data.
    #[serde(default = "default_true")]
    pub data_change: bool,
    /// File size in bytes, when the writer recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Partition values, when the writer recorded them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_values: Option<PartitionValues>,
}

/// A file in the dedicated change-data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdcFile {
    /// Path relative to the table root.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// Partition values of the change rows.
    #[serde(default)]
    pub partition_values: PartitionValues,
    /// Change files never change table data themselves.
    #[serde(default)]
    pub data_change: bool,
}

/// Provenance of a commit; only `timestamp` matters to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    /// Wall-clock commit time in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Operation name, for example `WRITE` or `DELETE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Operation parameters as written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_parameters: Option<Value>,
    /// Any other provenance fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-file statistics carried in [`AddFile::stats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
    /// Number of rows in the file.
    #[serde(default)]
    pub num_records: Option<u64>,
    /// Per-column minimum values.
    #[serde(default)]
    pub min_values: Map<String, Value>,
    /// Per-column maximum values.
    #[serde(default)]
    pub max_values: Map<String, Value>,
    /// Per-column null counts.
    #[serde(default)]
    pub null_count: Map<String, Value>,
}

/// One action recorded in a commit file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Action {
    /// Reader/writer protocol requirements.
    #[serde(rename = "protocol")]
    Protocol(Protocol),
    /// Replace table metadata.
    #[serde(rename = "metaData")]
    Metadata(Metadata),
    /// Add a data file.
    #[serde(rename = "add")]
    Add(AddFile),
    /// Remove a data file.
    #[serde(rename = "remove")]
    Remove(RemoveFile),
    /// Record a change-data file.
    #[serde(rename = "cdc")]
    Cdc(CdcFile),
    /// Commit provenance.
    #[serde(rename = "commitInfo")]
    CommitInfo(CommitInfo),
}

impl Action {
    /// Serialize as a single log line (without the trailing newline).
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Raw shape of a log line; keys the engine does not know are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogLine {
    protocol: Option<Protocol>,
    #[serde(rename = "metaData", alias = "metadata")]
    meta_data: Option<Metadata>,
    add: Option<AddFile>,
    remove: Option<RemoveFile>,
    cdc: Option<CdcFile>,
    commit_info: Option<CommitInfo>,
}

impl From<LogLine> for Vec<Action> {
    fn from(line: LogLine) -> Self {
        let LogLine {
            protocol,
            meta_data,
            add,
            remove,
            cdc,
            commit_info,
        } = line;
        let mut actions = Vec::with_capacity(1);
        actions.extend(protocol.map(Action::Protocol));
        actions.extend(meta_data.map(Action::Metadata));
        actions.extend(add.map(Action::Add));
        actions.extend(remove.map(Action::Remove));
        actions.extend(cdc.map(Action::Cdc));
        actions.extend(commit_info.map(Action::CommitInfo));
        actions
    }
}

/// Parse one log line into the actions it carries.
///
/// Well-formed lines normally carry one action; lines with only unknown keys
/// (for example `txn`) yield none.
pub fn parse_action_line(line: &str) -> serde_json::Result<Vec<Action>> {
    let raw: LogLine = serde_json::from_str(line)?;
    Ok(raw.into())
}

/// A single, immutable commit of the transaction log.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Commit {
    /// Version taken from the commit file name.
    pub version: u64,
    /// Actions in file order.
    pub actions: Vec<Action>,
    /// Number of lines that could not be parsed and were skipped.
    pub skipped_lines: usize,
}

impl Commit {
    /// Parse the text of a commit file.
    ///
    /// Malformed lines are logged and skipped; blank lines are ignored.
    pub fn parse(version: u64, text: &str) -> Self {
        let mut actions = Vec::new();
        let mut skipped_lines = 0;

        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_action_line(line) {
                Ok(parsed) => actions.extend(parsed),
                Err(e) => {
                    skipped_lines += 1;
                    warn!(
                        "skipping malformed action at version {version}, line {}: {e}",
                        idx + 1
                    );
                }
            }
        }

        Self {
            version,
            actions,
            skipped_lines,
        }
    }

    /// Build a commit directly from actions (mainly for writers of test fixtures).
    pub fn from_actions(version: u64, actions: Vec<Action>) -> Self {
        Self {
            version,
            actions,
            skipped_lines: 0,
        }
    }

    /// Render the commit as newline-delimited JSON.
    pub fn to_json_lines(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for action in &self.actions {
            out.push_str(&action.to_json_line()?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Wall-clock timestamp from the first `commitInfo` that carries one.
    pub fn timestamp(&self) -> Option<i64> {
        self.actions.iter().find_map(|action| match action {
            Action::CommitInfo(info) => info.timestamp,
            _ => None,
        })
    }
}
