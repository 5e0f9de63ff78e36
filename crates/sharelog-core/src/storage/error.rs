use std::{error::Error, fmt, io};

use snafu::{Backtrace, prelude::*};

/// Errors produced by a concrete storage backend implementation.
///
/// Backend-specific failures are wrapped in this enum so higher layers can
/// map them into [`StorageError`] variants with path context attached.
#[derive(Debug)]
pub enum BackendError {
    /// A local filesystem I/O error.
    Local(io::Error),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Local(e) => write!(f, "local I/O error: {e}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BackendError::Local(e) => Some(e),
        }
    }
}

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// The specified path was not found.
    #[snafu(display("Path not found: {path}"))]
    NotFound {
        /// The path that was not found.
        path: String,
        /// Underlying backend error that caused the failure.
        source: BackendError,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// The specified path was not found and the backend has no OS-level
    /// error to attach (for example, the in-memory backend).
    #[snafu(display("Path not found: {path}"))]
    NotFoundNoSource {
        /// The path that was not found.
        path: String,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// An I/O error occurred on the local filesystem.
    #[snafu(display("Local I/O error at {path}: {source}"))]
    OtherIo {
        /// The path where the I/O error occurred.
        path: String,
        /// Underlying backend I/O error with platform-specific details.
        source: BackendError,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// The backend itself is unusable (poisoned lock, unreachable service).
    #[snafu(display("Storage backend {backend} unavailable: {message}"))]
    Unavailable {
        /// Identity of the backend that failed.
        backend: String,
        /// Human-readable description of the failure.
        message: String,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// An object was read successfully but is not valid UTF-8 text.
    #[snafu(display("Object at {path} is not valid UTF-8: {source}"))]
    InvalidUtf8 {
        /// The path of the object.
        path: String,
        /// Underlying decoding error.
        source: std::string::FromUtf8Error,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// An object was read but does not hold the expected JSON document.
    #[snafu(display("Object at {path} is not valid JSON: {source}"))]
    InvalidJson {
        /// The path of the object.
        path: String,
        /// Underlying JSON error.
        source: serde_json::Error,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// A pre-signed URL could not be minted for a path.
    #[snafu(display("Cannot sign URL for {path}: {message}"))]
    Signing {
        /// The path that was being signed.
        path: String,
        /// Human-readable description of the failure.
        message: String,
        /// The backtrace at the time the error occurred.
        backtrace: Backtrace,
    },

    /// A location string could not be mapped to a backend.
    #[snafu(display("Invalid table location {spec:?}: {message}"))]
    InvalidLocation {
        /// The location string supplied by the caller.
        spec: String,
        /// Why the location was rejected.
        message: String,
    },
}

impl StorageError {
    /// Returns true when the error means "the object does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound { .. } | StorageError::NotFoundNoSource { .. }
        )
    }

    /// Returns true when the backend itself could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StorageError::Unavailable { .. })
    }
}
