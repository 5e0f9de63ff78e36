//! Storage backend abstraction.
//!
//! The engine never talks to a filesystem or an object store directly. Every
//! read goes through [`StorageBackend`], a small async contract that the local
//! filesystem, in-memory tables and cloud object stores can all satisfy:
//!
//! - listing the entries of a directory (used for `_delta_log/`),
//! - existence checks and whole-object reads (bytes, text or JSON),
//! - minting time-limited signed URLs for data files.
//!
//! Paths passed to a backend are relative to the table root the backend was
//! created for, using `/` as separator regardless of platform.
//!
//! Backends are created and shared through an explicit [`BackendRegistry`]
//! rather than process-wide singletons, and signed URLs are reused through a
//! caller-owned [`SignedUrlCache`].

mod error;
mod local;
mod memory;
mod registry;
mod signing;
mod url_cache;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use snafu::prelude::*;

pub use error::{BackendError, StorageError};
pub(crate) use error::{
    InvalidJsonSnafu, InvalidLocationSnafu, InvalidUtf8Snafu, NotFoundNoSourceSnafu,
    NotFoundSnafu, OtherIoSnafu, SigningSnafu, UnavailableSnafu,
};
pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use registry::{BackendRegistry, TableLocation};
pub use signing::UrlSigner;
pub use url_cache::{SignedUrl, SignedUrlCache};

/// General result type used by storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Read-side storage contract consumed by the engine.
///
/// Implementations must be cheap to share behind an `Arc` and safe to call
/// concurrently; the engine never mutates storage.
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Stable identity of this backend instance (for example `file:///data/t1`).
    ///
    /// Used to key caches that must not mix entries across backends.
    fn id(&self) -> &str;

    /// List the names (not full paths) of the objects directly under `dir`.
    ///
    /// A missing directory yields an empty list. Ordering is unspecified.
    async fn list_files(&self, dir: &str) -> StorageResult<Vec<String>>;

    /// Check whether an object exists at `path`.
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Read an entire object as raw bytes.
    async fn read_file(&self, path: &str) -> StorageResult<Bytes>;

    /// Read an entire object as UTF-8 text.
    async fn read_text(&self, path: &str) -> StorageResult<String> {
        let bytes = self.read_file(path).await?;
        String::from_utf8(bytes.to_vec()).context(InvalidUtf8Snafu { path })
    }

    /// Read an entire object as a JSON document.
    async fn read_json_value(&self, path: &str) -> StorageResult<serde_json::Value> {
        let bytes = self.read_file(path).await?;
        serde_json::from_slice(&bytes).context(InvalidJsonSnafu { path })
    }

    /// Mint a URL granting read access to `path` for `ttl`.
    async fn presigned_url(&self, path: &str, ttl: Duration) -> StorageResult<String>;
}

/// Read the object at `path` and decode it into `T`.
pub async fn read_json<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    path: &str,
) -> StorageResult<T> {
    let value = backend.read_json_value(path).await?;
    serde_json::from_value(value).context(InvalidJsonSnafu { path })
}
