#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::TempDir;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

const SCHEMA: &str = r#"{"type":"struct","fields":[{"name":"id","type":"long","nullable":false,"metadata":{}},{"name":"city","type":"string","nullable":true,"metadata":{}},{"name":"region","type":"string","nullable":true,"metadata":{}}]}"#;

pub fn write_commit(root: &Path, version: u64, actions: &[Value]) -> TestResult {
    let log_dir = root.join("_delta_log");
    std::fs::create_dir_all(&log_dir)?;
    let mut text = String::new();
    for action in actions {
        text.push_str(&serde_json::to_string(action)?);
        text.push('\n');
    }
    std::fs::write(log_dir.join(format!("{version:020}.json")), text)?;
    Ok(())
}

pub fn write_rows(root: &Path, rel: &str, rows: &[Value]) -> TestResult {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut text = String::new();
    for row in rows {
        text.push_str(&serde_json::to_string(row)?);
        text.push('\n');
    }
    std::fs::write(path, text)?;
    Ok(())
}

fn add(path: &str, region: &str) -> Value {
    json!({"add": {
        "path": path,
        "size": 100,
        "partitionValues": {"region": region},
        "modificationTime": 0,
        "dataChange": true,
        "stats": {"numRecords": 2}
    }})
}

/// A partitioned `cities` table with three commits:
///
/// - v0 (t=1000): metadata, protocol, `region=eu/part-0.json`
/// - v1 (t=2000): `region=us/part-1.json`
/// - v2 (t=3000): remove `region=eu/part-0.json`, cdc file
pub fn cities_table(tmp: &TempDir) -> TestResult<PathBuf> {
    let root = tmp.path().join("cities");

    write_rows(
        &root,
        "region=eu/part-0.json",
        &[json!({"id": 1, "city": "Lyon"}), json!({"id": 2, "city": "Turin"})],
    )?;
    write_rows(
        &root,
        "region=us/part-1.json",
        &[json!({"id": 3, "city": "Austin"}), json!({"id": 4, "city": "Boise"})],
    )?;

    write_commit(
        &root,
        0,
        &[
            json!({"commitInfo": {"timestamp": 1000, "operation": "CREATE TABLE"}}),
            json!({"protocol": {"minReaderVersion": 1, "minWriterVersion": 2}}),
            json!({"metaData": {
                "id": "cities-id",
                "name": "cities",
                "format": {"provider": "parquet", "options": {}},
                "schemaString": SCHEMA,
                "partitionColumns": ["region"],
                "configuration": {}
            }}),
            add("region=eu/part-0.json", "eu"),
        ],
    )?;
    write_commit(
        &root,
        1,
        &[
            json!({"commitInfo": {"timestamp": 2000, "operation": "WRITE"}}),
            add("region=us/part-1.json", "us"),
        ],
    )?;
    write_commit(
        &root,
        2,
        &[
            json!({"commitInfo": {"timestamp": 3000, "operation": "DELETE"}}),
            json!({"remove": {
                "path": "region=eu/part-0.json",
                "deletionTimestamp": 0,
                "dataChange": true,
                "size": 100
            }}),
            json!({"cdc": {
                "path": "_change_data/cdc-2.json",
                "size": 40,
                "partitionValues": {"region": "eu"},
                "dataChange": false
            }}),
        ],
    )?;

    Ok(root)
}

/// Parse line-delimited JSON output.
pub fn ndjson(stdout: &[u8]) -> TestResult<Vec<Value>> {
    let text = std::str::from_utf8(stdout)?;
    let mut lines = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        lines.push(serde_json::from_str(line)?);
    }
    Ok(lines)
}
