//! Engine configuration.
//!
//! Loaded from a camelCase JSON document; every field has a default, so an
//! empty object is a valid configuration.
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use snafu::{Backtrace, prelude::*};

use crate::query::{DEFAULT_LIMIT, DEFAULT_READ_CONCURRENCY};
use crate::storage::{BackendRegistry, SignedUrlCache};

/// Errors from loading a configuration file.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    /// The file could not be read.
    #[snafu(display("Failed to read config file {}: {source}", path.display()))]
    Read {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// The file is not a valid configuration document.
    #[snafu(display("Invalid config file {}: {source}", path.display()))]
    Parse {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },
}

/// A logical `share.schema.table` name mapped to a physical location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    /// Share the table belongs to.
    pub share: String,
    /// Schema within the share.
    pub schema: String,
    /// Table name within the schema.
    pub name: String,
    /// Table root: a path, `file://` URI or `memory://` name.
    pub location: String,
}

/// Engine and caller-layer settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Page size when a request gives no limit hint.
    pub default_limit: usize,
    /// Hard cap on rows returned by one query.
    pub max_rows_per_query: usize,
    /// Lifetime of minted URLs, seconds.
    pub url_ttl_secs: u64,
    /// Remaining lifetime below which a cached URL is re-minted, seconds.
    pub url_refresh_margin_secs: u64,
    /// Data files decoded concurrently per query.
    pub read_concurrency: usize,
    /// Enumerate active files by path for stable pagination.
    pub sort_files_by_path: bool,
    /// Secret for local signed URLs; ephemeral when absent.
    pub signing_secret: Option<String>,
    /// Base URL for local signed URLs.
    pub url_base: Option<String>,
    /// Tables known to the static catalog.
    pub tables: Vec<TableEntry>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_rows_per_query: 10_000,
            url_ttl_secs: 3600,
            url_refresh_margin_secs: 60,
            read_concurrency: DEFAULT_READ_CONCURRENCY,
            sort_files_by_path: true,
            signing_secret: None,
            url_base: None,
            tables: Vec::new(),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("default_limit", &self.default_limit)
            .field("max_rows_per_query", &self.max_rows_per_query)
            .field("url_ttl_secs", &self.url_ttl_secs)
            .field("url_refresh_margin_secs", &self.url_refresh_margin_secs)
            .field("read_concurrency", &self.read_concurrency)
            .field("sort_files_by_path", &self.sort_files_by_path)
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("url_base", &self.url_base)
            .field("tables", &self.tables)
            .finish()
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json_str(path: &Path, text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).context(ParseSnafu { path })
    }

    /// Load a configuration file.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .context(ReadSnafu { path })?;
        Self::from_json_str(path, &text)
    }

    /// Lifetime of minted URLs.
    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.url_ttl_secs)
    }

    /// Refresh margin for cached URLs.
    pub fn url_refresh_margin(&self) -> Duration {
        Duration::from_secs(self.url_refresh_margin_secs)
    }

    /// A backend registry carrying the configured signing settings.
    pub fn backend_registry(&self) -> BackendRegistry {
        let mut registry = BackendRegistry::new();
        if let Some(secret) = &self.signing_secret {
            registry = registry.with_signing_secret(secret.as_bytes());
        }
        if let Some(base) = &self.url_base {
            registry = registry.with_url_base(base.clone());
        }
        registry
    }

    /// An empty URL cache using the configured refresh margin.
    pub fn url_cache(&self) -> SignedUrlCache {
        SignedUrlCache::new(self.url_refresh_margin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn empty_document_uses_defaults() -> TestResult {
        let config = EngineConfig::from_json_str(Path::new("inline"), "{}")?;
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.default_limit, 1000);
        assert_eq!(config.max_rows_per_query, 10_000);
        assert_eq!(config.read_concurrency, 8);
        assert!(config.sort_files_by_path);
        Ok(())
    }

    #[tokio::test]
    async fn loads_camel_case_file() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("sharelog.json");
        tokio::fs::write(
            &path,
            r#"{
                "maxRowsPerQuery": 50,
                "urlTtlSecs": 10,
                "sortFilesByPath": false,
                "signingSecret": "s3cret",
                "tables": [{"share":"s","schema":"d","name":"t","location":"/data/t"}]
            }"#,
        )
        .await?;

        let config = EngineConfig::from_json_file(&path).await?;
        assert_eq!(config.max_rows_per_query, 50);
        assert_eq!(config.url_ttl(), Duration::from_secs(10));
        assert!(!config.sort_files_by_path);
        assert_eq!(config.default_limit, 1000);
        assert_eq!(config.tables[0].location, "/data/t");
        assert!(!format!("{config:?}").contains("s3cret"));
        Ok(())
    }

    #[tokio::test]
    async fn reports_missing_and_invalid_files() -> TestResult {
        let tmp = TempDir::new()?;
        let missing = EngineConfig::from_json_file(tmp.path().join("nope.json")).await;
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let bad = tmp.path().join("bad.json");
        tokio::fs::write(&bad, "{\"defaultLimit\": \"many\"}").await?;
        let invalid = EngineConfig::from_json_file(&bad).await;
        assert!(matches!(invalid, Err(ConfigError::Parse { .. })));
        Ok(())
    }
}
