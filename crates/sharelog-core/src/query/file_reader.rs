//! Decoding data files into JSON rows.
//!
//! Dispatch is by file extension: `.parquet` goes through the columnar
//! decoder (parquet into Arrow record batches, then `arrow_json`), while
//! `.json`, `.jsonl` and `.ndjson` are read as one JSON object per line.
use std::path::Path;

use arrow::error::ArrowError;
use arrow_json::writer::{JsonArray, WriterBuilder};
use async_trait::async_trait;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::errors::ParquetError;
use serde_json::Value;
use snafu::{Backtrace, prelude::*};

use crate::query::Row;
use crate::storage::{StorageBackend, StorageError};
use crate::transaction_log::AddFile;

/// Why a single data file produced no rows.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DecodeError {
    /// The file bytes could not be read from storage.
    #[snafu(display("Failed to read data file {path}: {source}"))]
    Read {
        /// File path relative to the table root.
        path: String,
        /// Underlying storage error.
        #[snafu(backtrace)]
        source: StorageError,
    },

    /// The parquet container could not be opened or decoded.
    #[snafu(display("Failed to decode parquet file {path}: {source}"))]
    Parquet {
        /// File path relative to the table root.
        path: String,
        /// Underlying parquet error.
        source: ParquetError,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// Record batches could not be converted to JSON.
    #[snafu(display("Failed to convert {path} to JSON rows: {source}"))]
    Arrow {
        /// File path relative to the table root.
        path: String,
        /// Underlying arrow error.
        source: ArrowError,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// A line (or the converted batch output) was not valid JSON.
    #[snafu(display("Invalid JSON in {path} at line {line}: {source}"))]
    Json {
        /// File path relative to the table root.
        path: String,
        /// 1-based line number (0 for converted parquet output).
        line: usize,
        /// Underlying JSON error.
        source: serde_json::Error,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// A JSON line held something other than an object.
    #[snafu(display("Line {line} of {path} is not a JSON object"))]
    NotAnObject {
        /// File path relative to the table root.
        path: String,
        /// 1-based line number.
        line: usize,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// No decoder handles this file's extension.
    #[snafu(display("Unsupported data file format: {path}"))]
    UnsupportedFormat {
        /// File path relative to the table root.
        path: String,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },
}

impl DecodeError {
    /// The storage error behind a failed read, if that is what happened.
    pub fn storage_source(&self) -> Option<&StorageError> {
        match self {
            DecodeError::Read { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Decodes one data file into rows.
#[async_trait]
pub trait FileContentReader: Send + Sync + std::fmt::Debug {
    /// Read every row of `file` from `backend`.
    async fn read_rows(
        &self,
        backend: &dyn StorageBackend,
        file: &AddFile,
    ) -> Result<Vec<Row>, DecodeError>;
}

/// Data file encodings the default reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFileKind {
    /// Columnar parquet container.
    Parquet,
    /// Newline-delimited JSON objects.
    JsonLines,
}

impl DataFileKind {
    /// Pick a decoder from the file extension (case-insensitive).
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "parquet" => Some(DataFileKind::Parquet),
            "json" | "jsonl" | "ndjson" => Some(DataFileKind::JsonLines),
            _ => None,
        }
    }
}

/// Reader for parquet and JSON-lines data files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFileReader;

#[async_trait]
impl FileContentReader for DefaultFileReader {
    async fn read_rows(
        &self,
        backend: &dyn StorageBackend,
        file: &AddFile,
    ) -> Result<Vec<Row>, DecodeError> {
        let path = file.path.as_str();
        let kind = DataFileKind::from_path(path).context(UnsupportedFormatSnafu { path })?;
        let bytes = backend.read_file(path).await.context(ReadSnafu { path })?;

        match kind {
            DataFileKind::Parquet => decode_parquet(path, bytes),
            DataFileKind::JsonLines => decode_json_lines(path, &bytes),
        }
    }
}

/// Decode a parquet file held in memory into JSON rows.
pub fn decode_parquet(path: &str, bytes: Bytes) -> Result<Vec<Row>, DecodeError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .context(ParquetSnafu { path })?
        .build()
        .context(ParquetSnafu { path })?;

    let mut writer = WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(Vec::new());
    for batch in reader {
        let batch = batch.context(ArrowSnafu { path })?;
        writer.write(&batch).context(ArrowSnafu { path })?;
    }
    writer.finish().context(ArrowSnafu { path })?;

    let buf = writer.into_inner();
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&buf).context(JsonSnafu { path, line: 0usize })
}

/// Decode newline-delimited JSON objects; blank lines are ignored.
pub fn decode_json_lines(path: &str, bytes: &[u8]) -> Result<Vec<Row>, DecodeError> {
    let mut rows = Vec::new();
    for (idx, line) in bytes.split(|b| *b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        let line_no = idx + 1;
        match serde_json::from_slice::<Value>(line).context(JsonSnafu {
            path,
            line: line_no,
        })? {
            Value::Object(row) => rows.push(row),
            _ => {
                return NotAnObjectSnafu {
                    path,
                    line: line_no,
                }
                .fail();
            }
        }
    }
    Ok(rows)
}
