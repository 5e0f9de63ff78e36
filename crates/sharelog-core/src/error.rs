//! Error types and SNAFU context selectors for engine operations.
//!
//! Only failures that must end the caller's request live here. Degradations
//! the engine recovers from (a malformed log line, an unparsable schema, a
//! data file that cannot be decoded, a URL that cannot be signed) are logged
//! through the `log` facade and never surface as an [`EngineError`].

use snafu::{Backtrace, prelude::*};

use crate::storage::StorageError;

/// Fatal errors from replay, change extraction, queries and manifests.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EngineError {
    /// The table's log directory holds no commit files.
    #[snafu(display("No commit files found in the transaction log of {location}"))]
    MissingLog {
        /// Identity of the table's storage location.
        location: String,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// The log exists but no metadata action was committed up to the resolved version.
    #[snafu(display("Table {location} has no metadata as of version {version}"))]
    MissingMetadata {
        /// Identity of the table's storage location.
        location: String,
        /// Resolved version (`-1` when nothing was folded).
        version: i64,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },

    /// The storage backend failed while listing or reading commits.
    ///
    /// Backtraces are delegated to the inner StorageError.
    #[snafu(display("Storage error while reading table {location}: {source}"))]
    Storage {
        /// Identity of the table's storage location.
        location: String,
        /// Underlying storage error returned by the backend.
        #[snafu(backtrace)]
        source: StorageError,
    },

    /// A protocol line could not be encoded as JSON.
    #[snafu(display("Failed to encode protocol response line: {source}"))]
    Encode {
        /// Underlying serialization error.
        source: serde_json::Error,
        /// Backtrace for debugging.
        backtrace: Backtrace,
    },
}

/// Convenience alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;
