//! Mapping logical `share.schema.table` names to table locations.
//!
//! The real catalog is an external service; [`StaticCatalog`] stands in for
//! it with a fixed list, usually taken from [`EngineConfig::tables`].
use std::collections::HashMap;

use log::warn;

use crate::config::{EngineConfig, TableEntry};
use crate::storage::{StorageBackend, StorageResult, TableLocation, read_json};

/// Resolves logical table names to physical locations.
pub trait Catalog: Send + Sync + std::fmt::Debug {
    /// Location of `share.schema.table`, or `None` if the name is unknown.
    fn resolve(&self, share: &str, schema: &str, table: &str) -> Option<TableLocation>;
}

type TableKey = (String, String, String);

/// A catalog backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    tables: HashMap<TableKey, TableLocation>,
}

impl StaticCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one table.
    pub fn insert(&mut self, share: &str, schema: &str, table: &str, location: TableLocation) {
        self.tables.insert(
            (share.to_string(), schema.to_string(), table.to_string()),
            location,
        );
    }

    /// Build a catalog from config entries; entries with a bad location are
    /// logged and left out.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a TableEntry>) -> Self {
        let mut catalog = Self::new();
        for entry in entries {
            match TableLocation::parse(&entry.location) {
                Ok(location) => catalog.insert(&entry.share, &entry.schema, &entry.name, location),
                Err(e) => warn!(
                    "ignoring catalog entry {}.{}.{}: {e}",
                    entry.share, entry.schema, entry.name
                ),
            }
        }
        catalog
    }

    /// Build a catalog from the `tables` list of `config`.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::from_entries(&config.tables)
    }

    /// Load a catalog from a JSON array of table entries stored at `path`.
    pub async fn load(backend: &dyn StorageBackend, path: &str) -> StorageResult<Self> {
        let entries: Vec<TableEntry> = read_json(backend, path).await?;
        Ok(Self::from_entries(&entries))
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true when the catalog has no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl Catalog for StaticCatalog {
    fn resolve(&self, share: &str, schema: &str, table: &str) -> Option<TableLocation> {
        self.tables
            .get(&(share.to_string(), schema.to_string(), table.to_string()))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryBackend, StorageError};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn entry(name: &str, location: &str) -> TableEntry {
        TableEntry {
            share: "share1".to_string(),
            schema: "default".to_string(),
            name: name.to_string(),
            location: location.to_string(),
        }
    }

    #[test]
    fn resolves_configured_tables_and_skips_bad_locations() {
        let entries = [
            entry("sales", "/data/sales"),
            entry("events", "memory://events"),
            entry("remote", "s3://bucket/remote"),
        ];
        let catalog = StaticCatalog::from_entries(&entries);

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.resolve("share1", "default", "sales"),
            Some(TableLocation::local("/data/sales"))
        );
        assert_eq!(
            catalog.resolve("share1", "default", "events"),
            Some(TableLocation::Memory("events".to_string()))
        );
        assert_eq!(catalog.resolve("share1", "default", "remote"), None);
        assert_eq!(catalog.resolve("share2", "default", "sales"), None);
    }

    #[tokio::test]
    async fn loads_entries_from_storage() -> TestResult {
        let backend = MemoryBackend::new("catalog");
        backend.put_text(
            "catalog.json",
            r#"[{"share":"s","schema":"d","name":"t","location":"/data/t"}]"#,
        )?;
        backend.put_text("broken.json", r#"{"share":"s"}"#)?;

        let catalog = StaticCatalog::load(&backend, "catalog.json").await?;
        assert_eq!(
            catalog.resolve("s", "d", "t"),
            Some(TableLocation::local("/data/t"))
        );

        let err = StaticCatalog::load(&backend, "broken.json")
            .await
            .expect_err("not an array");
        assert!(matches!(err, StorageError::InvalidJson { .. }));
        Ok(())
    }
}
