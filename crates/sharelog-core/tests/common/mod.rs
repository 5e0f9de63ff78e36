#![allow(dead_code)]

use std::{path::Path, sync::Arc};

use arrow::array::{Int64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde_json::{Value, json};
use tempfile::TempDir;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

pub const SCHEMA: &str = r#"{"type":"struct","fields":[{"name":"id","type":"long","nullable":false,"metadata":{}},{"name":"name","type":"string","nullable":true,"metadata":{}},{"name":"region","type":"string","nullable":true,"metadata":{}}]}"#;

/// Create `<tmp>/<name>/_delta_log` and return the table root.
pub fn table_root(tmp: &TempDir, name: &str) -> TestResult<std::path::PathBuf> {
    let root = tmp.path().join(name);
    std::fs::create_dir_all(root.join("_delta_log"))?;
    Ok(root)
}

/// Write one commit file from raw action values.
pub fn write_commit(root: &Path, version: u64, actions: &[Value]) -> TestResult {
    let mut text = String::new();
    for action in actions {
        text.push_str(&serde_json::to_string(action)?);
        text.push('\n');
    }
    let name = format!("{version:020}.json");
    std::fs::write(root.join("_delta_log").join(name), text)?;
    Ok(())
}

pub fn metadata(id: &str, partition_columns: &[&str]) -> Value {
    json!({"metaData": {
        "id": id,
        "format": {"provider": "parquet", "options": {}},
        "schemaString": SCHEMA,
        "partitionColumns": partition_columns,
        "configuration": {},
        "createdTime": 1_700_000_000_000i64
    }})
}

pub fn add(path: &str, size: u64) -> Value {
    json!({"add": {
        "path": path,
        "size": size,
        "partitionValues": {},
        "modificationTime": 0,
        "dataChange": true
    }})
}

pub fn add_partitioned(path: &str, size: u64, region: &str) -> Value {
    json!({"add": {
        "path": path,
        "size": size,
        "partitionValues": {"region": region},
        "modificationTime": 0,
        "dataChange": true,
        "stats": "{\"numRecords\":2}"
    }})
}

pub fn remove(path: &str) -> Value {
    json!({"remove": {"path": path, "deletionTimestamp": 0, "dataChange": true}})
}

pub fn commit_info(timestamp: i64) -> Value {
    json!({"commitInfo": {"timestamp": timestamp, "operation": "WRITE"}})
}

/// Write a parquet file with `id` and `name` columns.
pub fn write_parquet(path: &Path, rows: &[(i64, Option<&str>)]) -> TestResult {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut ids = Int64Builder::with_capacity(rows.len());
    let mut names = StringBuilder::new();
    for (id, name) in rows {
        ids.append_value(*id);
        match name {
            Some(n) => names.append_value(n),
            None => names.append_null(),
        }
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(ids.finish()) as _, Arc::new(names.finish())],
    )?;

    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
