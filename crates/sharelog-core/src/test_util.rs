//! Builders for log fixtures used by unit tests.
use std::{collections::HashMap, sync::Arc};

use crate::storage::{MemoryBackend, StorageResult};
use crate::transaction_log::actions::{
    Action, AddFile, CdcFile, Commit, CommitInfo, Format, Metadata, RemoveFile,
};
use crate::transaction_log::layout::commit_rel_path;

pub(crate) const SCHEMA: &str = r#"{"type":"struct","fields":[{"name":"id","type":"long","nullable":false,"metadata":{}},{"name":"name","type":"string","nullable":true,"metadata":{}}]}"#;

pub(crate) fn metadata(id: &str) -> Action {
    Action::Metadata(Metadata {
        id: id.to_string(),
        name: Some(id.to_string()),
        description: None,
        format: Format::default(),
        schema_string: SCHEMA.to_string(),
        partition_columns: Vec::new(),
        configuration: HashMap::new(),
        created_time: Some(0),
    })
}

pub(crate) fn add_file(path: &str, size: u64) -> AddFile {
    AddFile {
        path: path.to_string(),
        size,
        partition_values: HashMap::new(),
        modification_time: 0,
        data_change: true,
        stats: None,
        tags: None,
    }
}

pub(crate) fn add(path: &str, size: u64) -> Action {
    Action::Add(add_file(path, size))
}

pub(crate) fn add_at(path: &str, size: u64, modification_time: i64) -> Action {
    Action::Add(AddFile {
        modification_time,
        ..add_file(path, size)
    })
}

pub(crate) fn remove(path: &str) -> Action {
    Action::Remove(RemoveFile {
        path: path.to_string(),
        deletion_timestamp: None,
        data_change: true,
        size: None,
        partition_values: None,
    })
}

pub(crate) fn cdc(path: &str, size: u64) -> Action {
    Action::Cdc(CdcFile {
        path: path.to_string(),
        size,
        partition_values: HashMap::new(),
        data_change: false,
    })
}

pub(crate) fn commit_info(timestamp: i64) -> Action {
    Action::CommitInfo(CommitInfo {
        timestamp: Some(timestamp),
        operation: Some("WRITE".to_string()),
        ..CommitInfo::default()
    })
}

/// Commits built directly, without going through storage.
pub(crate) fn commits(specs: &[(u64, Vec<Action>)]) -> Vec<Commit> {
    specs
        .iter()
        .map(|(version, actions)| Commit::from_actions(*version, actions.clone()))
        .collect()
}

/// Write each commit into a fresh in-memory table.
pub(crate) fn memory_table(
    name: &str,
    specs: &[(u64, Vec<Action>)],
) -> Result<Arc<MemoryBackend>, Box<dyn std::error::Error>> {
    let backend = Arc::new(MemoryBackend::new(name));
    for commit in commits(specs) {
        write_commit(&backend, &commit)?;
    }
    Ok(backend)
}

pub(crate) fn write_commit(backend: &MemoryBackend, commit: &Commit) -> StorageResult<()> {
    let text = commit
        .to_json_lines()
        .unwrap_or_else(|e| panic!("fixture commit must serialize: {e}"));
    backend.put_text(&commit_rel_path(commit.version), &text)
}
