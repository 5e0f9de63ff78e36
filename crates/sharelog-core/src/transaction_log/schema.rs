//! Column listing derived from a metadata `schemaString`.
//!
//! The schema is a JSON struct type:
//! `{"type":"struct","fields":[{"name":"id","type":"long","nullable":false}]}`.
//! Only top-level fields are listed; a nested type is reported as its JSON
//! text. A schema string that cannot be parsed degrades to an empty list.
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transaction_log::actions::Metadata;

/// One top-level column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Primitive type name, or the JSON text of a nested type.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Whether the column accepts nulls.
    pub nullable: bool,
}

#[derive(Debug, Deserialize)]
struct StructType {
    #[serde(default)]
    fields: Vec<StructField>,
}

#[derive(Debug, Deserialize)]
struct StructField {
    name: String,
    #[serde(rename = "type")]
    data_type: Value,
    #[serde(default = "nullable_default")]
    nullable: bool,
}

fn nullable_default() -> bool {
    true
}

/// Parse `schema_string` into top-level columns, or an empty list on failure.
pub fn parse_columns(schema_string: &str) -> Vec<ColumnInfo> {
    match serde_json::from_str::<StructType>(schema_string) {
        Ok(schema) => schema
            .fields
            .into_iter()
            .map(|field| ColumnInfo {
                name: field.name,
                data_type: match field.data_type {
                    Value::String(name) => name,
                    nested => nested.to_string(),
                },
                nullable: field.nullable,
            })
            .collect(),
        Err(e) => {
            warn!("unparsable table schema, reporting no columns: {e}");
            Vec::new()
        }
    }
}

impl Metadata {
    /// Top-level columns of this table's schema.
    pub fn columns(&self) -> Vec<ColumnInfo> {
        parse_columns(&self.schema_string)
    }
}
