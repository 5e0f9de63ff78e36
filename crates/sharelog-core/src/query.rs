//! Materializing a page of rows from a resolved table state.
//!
//! A query resolves the table (optionally as of a cutoff), lists the schema
//! columns, decodes every active file through a [`FileContentReader`] and
//! slices the concatenated rows. A file that fails to decode is logged and
//! contributes nothing; only missing log, missing metadata and an unreachable
//! backend fail the query.
//!
//! Files are enumerated sorted by path by default, so repeated queries page
//! through the same row order. Reads run with bounded concurrency through
//! `futures`' `buffered`, which keeps results in enumeration order.
pub mod file_reader;

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use log::{debug, warn};
use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::table::SharedTable;
use crate::transaction_log::{AddFile, ColumnInfo, Cutoff};

pub use file_reader::{DataFileKind, DecodeError, DefaultFileReader, FileContentReader};

/// One decoded row, keyed by column name.
pub type Row = Map<String, Value>;

/// Default page size when the caller gives none.
pub const DEFAULT_LIMIT: usize = 1000;

/// Default number of data files read concurrently.
pub const DEFAULT_READ_CONCURRENCY: usize = 8;

/// Parameters of a single query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Maximum rows to return.
    pub limit: usize,
    /// Rows to skip before the page starts.
    pub offset: usize,
    /// Resolve the table as of this point instead of the latest version.
    pub cutoff: Option<Cutoff>,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
            cutoff: None,
        }
    }
}

/// A page of rows plus the information needed to request the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Top-level schema columns (empty if the schema could not be parsed).
    pub columns: Vec<ColumnInfo>,
    /// The requested page.
    pub rows: Vec<Row>,
    /// Row count across all active files, before slicing.
    pub total_rows: usize,
    /// Whether rows remain after this page.
    pub has_more: bool,
    /// Version the table was resolved at (`-1` when nothing was folded).
    pub version: i64,
}

/// Slice `rows[offset .. offset + limit]`, clamped to the available rows.
///
/// Returns the page, the total count and whether more rows follow.
pub fn paginate(rows: Vec<Row>, offset: usize, limit: usize) -> (Vec<Row>, usize, bool) {
    let total = rows.len();
    let has_more = offset.saturating_add(limit) < total;
    let page = rows.into_iter().skip(offset).take(limit).collect();
    (page, total, has_more)
}

/// Fill partition columns missing from `row` with the file's partition values.
fn inject_partition_values(row: &mut Row, partition_columns: &[String], file: &AddFile) {
    for column in partition_columns {
        if row.contains_key(column) {
            continue;
        }
        let value = file
            .partition_values
            .get(column)
            .cloned()
            .flatten()
            .map_or(Value::Null, Value::String);
        row.insert(column.clone(), value);
    }
}

/// Runs queries against shared tables.
#[derive(Debug, Clone)]
pub struct QueryOrchestrator {
    reader: Arc<dyn FileContentReader>,
    read_concurrency: usize,
    sort_files_by_path: bool,
}

impl Default for QueryOrchestrator {
    fn default() -> Self {
        Self::new(Arc::new(DefaultFileReader))
    }
}

impl QueryOrchestrator {
    /// Create an orchestrator decoding files with `reader`.
    pub fn new(reader: Arc<dyn FileContentReader>) -> Self {
        Self {
            reader,
            read_concurrency: DEFAULT_READ_CONCURRENCY,
            sort_files_by_path: true,
        }
    }

    /// Create an orchestrator with the read settings from `config`.
    pub fn from_config(reader: Arc<dyn FileContentReader>, config: &EngineConfig) -> Self {
        Self::new(reader)
            .with_read_concurrency(config.read_concurrency)
            .with_sort_files_by_path(config.sort_files_by_path)
    }

    /// Number of files decoded at once (at least one).
    pub fn with_read_concurrency(mut self, n: usize) -> Self {
        self.read_concurrency = n.max(1);
        self
    }

    /// Enumerate files by path (`true`) or in hash-map order (`false`).
    pub fn with_sort_files_by_path(mut self, sort: bool) -> Self {
        self.sort_files_by_path = sort;
        self
    }

    /// Resolve `table`, decode its active files and return one page of rows.
    pub async fn query(
        &self,
        table: &SharedTable,
        request: &QueryRequest,
    ) -> EngineResult<QueryResult> {
        let (state, metadata) = table
            .state_with_metadata(request.cutoff.as_ref())
            .await?;
        let columns = metadata.columns();
        let partition_columns = metadata.partition_columns.as_slice();
        let backend = table.backend().as_ref();
        let files = state.files_in_order(self.sort_files_by_path);

        debug!(
            "query on {} at version {}: reading {} file(s)",
            table.location(),
            state.version_or_sentinel(),
            files.len()
        );

        let per_file: Vec<Vec<Row>> = stream::iter(files)
            .map(|file| async move {
                match self.reader.read_rows(backend, file).await {
                    Ok(mut rows) => {
                        for row in &mut rows {
                            inject_partition_values(row, partition_columns, file);
                        }
                        Ok(rows)
                    }
                    Err(DecodeError::Read { source, .. }) if source.is_unavailable() => {
                        Err(EngineError::Storage {
                            location: table.location().to_string(),
                            source,
                        })
                    }
                    Err(e) => {
                        warn!("skipping data file {}: {e}", file.path);
                        Ok(Vec::new())
                    }
                }
            })
            .buffered(self.read_concurrency)
            .try_collect()
            .await?;

        let rows: Vec<Row> = per_file.into_iter().flatten().collect();
        let (rows, total_rows, has_more) = paginate(rows, request.offset, request.limit);

        Ok(QueryResult {
            columns,
            rows,
            total_rows,
            has_more,
            version: state.version_or_sentinel(),
        })
    }
}
