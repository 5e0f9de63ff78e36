//! Wire encoding of sharing-protocol responses.
//!
//! A streamed response is newline-delimited JSON in a fixed order:
//!
//! ```text
//! {"protocol":{"minReaderVersion":1}}
//! {"metaData":{"id":"...","format":{...},"schemaString":"...","version":3}}
//! {"file":{"url":"...","id":"...","partitionValues":{},"size":1024,"expirationTimestamp":...}}
//! ...
//! ```
//!
//! Change manifests use `add`, `remove` and `cdf` lines instead of `file`,
//! each carrying the commit version and timestamp. Every file line needs a
//! signed URL minted on the spot (or reused from a [`SignedUrlCache`]); a
//! file whose URL cannot be minted is logged and left out, the rest of the
//! manifest still goes out. A backend reporting itself unavailable ends the
//! stream with an error instead. Lines are produced lazily by the returned
//! [`ResponseStream`].
pub mod request;

use std::{pin::Pin, sync::Arc, time::Duration};

use chrono::Utc;
use futures::{Stream, StreamExt, future, stream};
use log::warn;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use snafu::prelude::*;

use crate::changes::{ChangeRange, ChangeRecord, ChangeSet, ChangeType};
use crate::config::EngineConfig;
use crate::error::{EncodeSnafu, EngineError, EngineResult, MissingMetadataSnafu};
use crate::query::{QueryResult, Row};
use crate::storage::{SignedUrl, SignedUrlCache, StorageBackend};
use crate::table::SharedTable;
use crate::transaction_log::{AddFile, Cutoff, Metadata, PartitionValues, Protocol, TableState};

pub use request::{ChangeParams, QueryParams, RequestError, SnapshotParams, parse_timestamp};

/// Lazily produced, newline-terminated response lines.
pub type ResponseStream = Pin<Box<dyn Stream<Item = EngineResult<String>> + Send>>;

/// Stable file id: lowercase hex SHA-256 of the path.
pub fn file_id(path: &str) -> String {
    hex::encode(Sha256::digest(path.as_bytes()))
}

/// Table metadata as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataLine {
    /// The table's metadata action.
    #[serde(flatten)]
    pub metadata: Metadata,
    /// Version the response describes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Total bytes of the listed files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Number of listed files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_files: Option<usize>,
}

/// One data file with a URL the client can fetch it from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileLine {
    /// Signed, time-limited URL.
    pub url: String,
    /// [`file_id`] of the path.
    pub id: String,
    /// Partition values of the file.
    pub partition_values: PartitionValues,
    /// File size in bytes.
    pub size: u64,
    /// Serialized file statistics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<String>,
    /// Commit version (change manifests).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Change time in epoch milliseconds (change manifests).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// When `url` stops working, epoch milliseconds.
    pub expiration_timestamp: i64,
}

impl FileLine {
    fn for_add(file: AddFile, signed: SignedUrl) -> Self {
        let expiration_timestamp = signed.expiration_millis();
        Self {
            id: file_id(&file.path),
            url: signed.url,
            partition_values: file.partition_values,
            size: file.size,
            stats: file.stats,
            version: None,
            timestamp: None,
            expiration_timestamp,
        }
    }

    fn for_change(record: ChangeRecord, signed: SignedUrl) -> Self {
        let expiration_timestamp = signed.expiration_millis();
        Self {
            id: file_id(&record.path),
            url: signed.url,
            partition_values: record.partition_values.unwrap_or_default(),
            size: record.size,
            stats: record.stats,
            version: Some(record.version),
            timestamp: Some(record.timestamp),
            expiration_timestamp,
        }
    }
}

/// One line of a streamed response, keyed by its kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ResponseLine {
    /// Protocol requirements; always the first line.
    #[serde(rename = "protocol")]
    Protocol(Protocol),
    /// Table metadata; always the second line.
    #[serde(rename = "metaData")]
    Metadata(MetadataLine),
    /// An active file of a snapshot.
    #[serde(rename = "file")]
    File(FileLine),
    /// An added file of a change feed.
    #[serde(rename = "add")]
    Add(FileLine),
    /// A removed file of a change feed.
    #[serde(rename = "remove")]
    Remove(FileLine),
    /// A change-data file of a change feed.
    #[serde(rename = "cdf")]
    Cdf(FileLine),
}

impl ResponseLine {
    fn change(change_type: ChangeType, line: FileLine) -> Self {
        match change_type {
            ChangeType::Add => ResponseLine::Add(line),
            ChangeType::Remove => ResponseLine::Remove(line),
            ChangeType::Cdf => ResponseLine::Cdf(line),
        }
    }

    /// Encode as one newline-terminated JSON line.
    pub fn to_ndjson(&self) -> EngineResult<String> {
        let mut line = serde_json::to_string(self).context(EncodeSnafu)?;
        line.push('\n');
        Ok(line)
    }
}

/// Mints URLs for one backend through the shared cache.
#[derive(Debug, Clone)]
struct UrlMinter {
    backend: Arc<dyn StorageBackend>,
    cache: SignedUrlCache,
    ttl: Duration,
}

impl UrlMinter {
    /// Mint (or reuse) a URL for `path`.
    ///
    /// A backend that is down fails the whole manifest; any other signing
    /// failure drops just this file.
    async fn mint(&self, path: &str) -> EngineResult<Option<SignedUrl>> {
        match self
            .cache
            .get_or_mint(self.backend.as_ref(), path, self.ttl, Utc::now())
            .await
        {
            Ok(signed) => Ok(Some(signed)),
            Err(source) if source.is_unavailable() => Err(EngineError::Storage {
                location: self.backend.id().to_string(),
                source,
            }),
            Err(e) => {
                warn!("omitting {path} from manifest: {e}");
                Ok(None)
            }
        }
    }

    async fn file_line(self, file: AddFile) -> Option<EngineResult<String>> {
        match self.mint(&file.path).await {
            Ok(signed) => signed.map(|signed| {
                ResponseLine::File(FileLine::for_add(file, signed)).to_ndjson()
            }),
            Err(e) => Some(Err(e)),
        }
    }

    async fn change_line(self, record: ChangeRecord) -> Option<EngineResult<String>> {
        match self.mint(&record.path).await {
            Ok(signed) => signed.map(|signed| {
                let change_type = record.change_type;
                ResponseLine::change(change_type, FileLine::for_change(record, signed)).to_ndjson()
            }),
            Err(e) => Some(Err(e)),
        }
    }
}

fn with_header(
    header: [String; 2],
    lines: impl Stream<Item = Option<EngineResult<String>>> + Send + 'static,
) -> ResponseStream {
    Box::pin(stream::iter(header.map(Ok)).chain(lines.filter_map(future::ready)))
}

/// Builds streamed snapshot and change manifests.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    cache: SignedUrlCache,
    ttl: Duration,
    sort_files_by_path: bool,
}

impl ManifestBuilder {
    /// Create a builder minting URLs valid for `ttl`, reusing `cache`.
    pub fn new(cache: SignedUrlCache, ttl: Duration) -> Self {
        Self {
            cache,
            ttl,
            sort_files_by_path: true,
        }
    }

    /// Create a builder with the URL and ordering settings from `config`.
    pub fn from_config(config: &EngineConfig, cache: SignedUrlCache) -> Self {
        Self::new(cache, config.url_ttl()).with_sort_files_by_path(config.sort_files_by_path)
    }

    /// List snapshot files by path (`true`) or in hash-map order (`false`).
    pub fn with_sort_files_by_path(mut self, sort: bool) -> Self {
        self.sort_files_by_path = sort;
        self
    }

    fn minter(&self, backend: Arc<dyn StorageBackend>) -> UrlMinter {
        UrlMinter {
            backend,
            cache: self.cache.clone(),
            ttl: self.ttl,
        }
    }

    /// Resolve `table` (optionally as of `cutoff`) and stream its file manifest.
    pub async fn table_manifest(
        &self,
        table: &SharedTable,
        cutoff: Option<&Cutoff>,
    ) -> EngineResult<ResponseStream> {
        let (state, metadata) = table.state_with_metadata(cutoff).await?;
        self.state_manifest(Arc::clone(table.backend()), state, metadata)
    }

    /// Stream the manifest of an already resolved state.
    pub fn state_manifest(
        &self,
        backend: Arc<dyn StorageBackend>,
        state: TableState,
        metadata: Metadata,
    ) -> EngineResult<ResponseStream> {
        let header = [
            ResponseLine::Protocol(state.protocol.clone().unwrap_or_default()).to_ndjson()?,
            ResponseLine::Metadata(MetadataLine {
                metadata,
                version: state.version,
                size: Some(state.total_size()),
                num_files: Some(state.active_files.len()),
            })
            .to_ndjson()?,
        ];
        let files: Vec<AddFile> = state
            .files_in_order(self.sort_files_by_path)
            .into_iter()
            .cloned()
            .collect();

        let minter = self.minter(backend);
        let lines = stream::iter(files).then(move |file| minter.clone().file_line(file));
        Ok(with_header(header, lines))
    }

    /// Extract changes over `range` from `table` and stream them.
    pub async fn change_manifest(
        &self,
        table: &SharedTable,
        range: Option<ChangeRange>,
    ) -> EngineResult<ResponseStream> {
        let set = table.changes(range).await?;
        self.change_set_manifest(Arc::clone(table.backend()), table.location(), set)
    }

    /// Stream an already extracted change set.
    ///
    /// Fails with `MissingMetadata` when no scanned commit carried metadata.
    pub fn change_set_manifest(
        &self,
        backend: Arc<dyn StorageBackend>,
        location: &str,
        set: ChangeSet,
    ) -> EngineResult<ResponseStream> {
        let ChangeSet {
            metadata,
            protocol,
            changes,
            end_version,
            ..
        } = set;
        let metadata = metadata.context(MissingMetadataSnafu {
            location,
            version: i64::try_from(end_version).unwrap_or(i64::MAX),
        })?;

        let header = [
            ResponseLine::Protocol(protocol.unwrap_or_default()).to_ndjson()?,
            ResponseLine::Metadata(MetadataLine {
                metadata,
                version: Some(end_version),
                size: None,
                num_files: None,
            })
            .to_ndjson()?,
        ];

        let minter = self.minter(backend);
        let lines = stream::iter(changes).then(move |record| minter.clone().change_line(record));
        Ok(with_header(header, lines))
    }
}

/// Access limits reported alongside query rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessInfo {
    /// Hard cap on rows per query.
    pub max_rows_per_query: usize,
}

/// Non-streamed query response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// The page of rows.
    pub rows: Vec<Row>,
    /// Number of rows in this page.
    pub row_count: usize,
    /// Whether more rows follow.
    pub has_more: bool,
    /// Limits that applied to the request.
    pub access_info: AccessInfo,
}

impl QueryResponse {
    /// Wrap a query result for the wire.
    pub fn new(result: QueryResult, max_rows_per_query: usize) -> Self {
        Self {
            row_count: result.rows.len(),
            rows: result.rows,
            has_more: result.has_more,
            access_info: AccessInfo { max_rows_per_query },
        }
    }
}
