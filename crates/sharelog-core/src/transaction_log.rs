//! Read side of the append-only transaction log.
//!
//! A table is a directory of data files plus a `_delta_log/` directory of
//! immutable, newline-delimited JSON commits. Each commit adds and removes
//! data files and may replace the table metadata. This module reads that log
//! and nothing else:
//!
//! - [`layout`]: commit file naming and the log directory name.
//! - [`actions`]: the action model and lenient per-line parsing.
//! - [`log_reader`]: listing and loading commits through a storage backend.
//! - [`table_state`]: folding commits into a [`TableState`].
//! - [`time_travel`]: stopping replay at a version or timestamp cutoff.
//! - [`schema`]: the column listing of a table's schema string.
//!
//! ## On-disk layout
//!
//! ```text
//! table_root/
//!   _delta_log/
//!     00000000000000000000.json   # version 0
//!     00000000000000000001.json   # version 1
//!   part-00000.parquet
//!   _change_data/cdc-00000.parquet
//! ```
//!
//! A commit file holds one action per line, for example:
//!
//! ```json
//! {"commitInfo":{"timestamp":1700000000000,"operation":"WRITE"}}
//! {"metaData":{"id":"t1","format":{"provider":"parquet"},"schemaString":"...","partitionColumns":[]}}
//! {"add":{"path":"part-00000.parquet","size":1024,"partitionValues":{},"modificationTime":1700000000000,"dataChange":true}}
//! ```
//!
//! The engine never writes to the log; state is rebuilt from the listing on
//! every call.
pub mod actions;
pub mod layout;
pub mod log_reader;
pub mod schema;
pub mod table_state;
pub mod time_travel;

pub use actions::{
    Action, AddFile, CdcFile, Commit, CommitInfo, FileStats, Format, Metadata, PartitionValues,
    Protocol, RemoveFile,
};
pub use log_reader::TransactionLog;
pub use schema::ColumnInfo;
pub use table_state::{LogReplay, TableState};
pub use time_travel::{Cutoff, replay};
