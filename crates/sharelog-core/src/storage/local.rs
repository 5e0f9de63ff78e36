//! Local filesystem backend rooted at a table directory.

use std::{
    io,
    path::{Component, Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use snafu::prelude::*;
use tokio::fs;

use crate::storage::{
    BackendError, InvalidLocationSnafu, NotFoundSnafu, OtherIoSnafu, StorageBackend,
    StorageResult, UrlSigner,
};

/// A [`StorageBackend`] over a directory on the local filesystem.
///
/// Signed URLs are HMAC tokens rendered under `url_base`, which defaults to
/// the `file://` URL of the root directory. Deployments that serve the files
/// over HTTP point `url_base` at that server and share the signing secret.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    id: String,
    url_base: String,
    signer: UrlSigner,
}

impl LocalBackend {
    /// Create a backend rooted at `root` with an ephemeral signing secret.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let id = format!("file://{}", root.display());
        Self {
            url_base: id.clone(),
            id,
            root,
            signer: UrlSigner::ephemeral(),
        }
    }

    /// Replace the signer (for example with one built from a configured secret).
    pub fn with_signer(mut self, signer: UrlSigner) -> Self {
        self.signer = signer;
        self
    }

    /// Render signed URLs under `base` instead of the root's `file://` URL.
    pub fn with_url_base(mut self, base: impl Into<String>) -> Self {
        self.url_base = base.into();
        self
    }

    /// Directory this backend is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Signer used for URLs minted by this backend.
    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    /// Resolve a relative object path, refusing anything that would escape the root.
    fn resolve(&self, rel: &str) -> StorageResult<PathBuf> {
        let rel_path = Path::new(rel.trim_start_matches('/'));
        let escapes = rel_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        ensure!(
            !escapes,
            InvalidLocationSnafu {
                spec: rel,
                message: "path escapes the table root",
            }
        );
        Ok(self.root.join(rel_path))
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn list_files(&self, dir: &str) -> StorageResult<Vec<String>> {
        let abs = self.resolve(dir)?;
        let path_str = abs.display().to_string();

        let mut entries = match fs::read_dir(&abs).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BackendError::Local(e)).context(OtherIoSnafu { path: path_str }),
        };

        let mut names = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(BackendError::Local(e)).context(OtherIoSnafu {
                        path: path_str.clone(),
                    });
                }
            };
            let is_file = entry
                .file_type()
                .await
                .map_err(BackendError::Local)
                .context(OtherIoSnafu {
                    path: entry.path().display().to_string(),
                })?
                .is_file();
            if is_file {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let abs = self.resolve(path)?;
        match fs::metadata(&abs).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BackendError::Local(e)).context(OtherIoSnafu {
                path: abs.display().to_string(),
            }),
        }
    }

    async fn read_file(&self, path: &str) -> StorageResult<Bytes> {
        let abs = self.resolve(path)?;
        let path_str = abs.display().to_string();

        match fs::read(&abs).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(BackendError::Local(e)).context(NotFoundSnafu { path: path_str })
            }
            Err(e) => Err(BackendError::Local(e)).context(OtherIoSnafu { path: path_str }),
        }
    }

    async fn presigned_url(&self, path: &str, ttl: Duration) -> StorageResult<String> {
        // Validate the path even though the file itself is not touched.
        self.resolve(path)?;
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = Utc::now().timestamp().saturating_add(ttl_secs);
        self.signer.signed_url(&self.url_base, path, expires)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[tokio::test]
    async fn list_files_returns_only_regular_files() -> TestResult {
        let tmp = TempDir::new()?;
        let log_dir = tmp.path().join("_delta_log");
        tokio::fs::create_dir_all(log_dir.join("nested")).await?;
        tokio::fs::write(log_dir.join("00000000000000000000.json"), "{}").await?;
        tokio::fs::write(log_dir.join("notes.txt"), "x").await?;

        let backend = LocalBackend::new(tmp.path());
        let mut names = backend.list_files("_delta_log").await?;
        names.sort();

        assert_eq!(names, vec!["00000000000000000000.json", "notes.txt"]);
        Ok(())
    }

    #[tokio::test]
    async fn list_files_on_missing_directory_is_empty() -> TestResult {
        let tmp = TempDir::new()?;
        let backend = LocalBackend::new(tmp.path());

        assert!(backend.list_files("_delta_log").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn read_file_returns_not_found_for_missing_file() -> TestResult {
        let tmp = TempDir::new()?;
        let backend = LocalBackend::new(tmp.path());

        let err = backend
            .read_file("missing.parquet")
            .await
            .expect_err("expected NotFound");
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn exists_and_read_text_roundtrip() -> TestResult {
        let tmp = TempDir::new()?;
        tokio::fs::create_dir_all(tmp.path().join("data")).await?;
        tokio::fs::write(tmp.path().join("data/rows.json"), "{\"a\":1}\n").await?;
        let backend = LocalBackend::new(tmp.path());

        assert!(backend.exists("data/rows.json").await?);
        assert!(!backend.exists("data/other.json").await?);
        assert_eq!(backend.read_text("data/rows.json").await?, "{\"a\":1}\n");
        Ok(())
    }

    #[tokio::test]
    async fn paths_escaping_the_root_are_rejected() -> TestResult {
        let tmp = TempDir::new()?;
        let backend = LocalBackend::new(tmp.path());

        let err = backend
            .read_file("../secret")
            .await
            .expect_err("expected InvalidLocation");
        assert!(matches!(err, StorageError::InvalidLocation { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn presigned_url_verifies_with_backend_signer() -> TestResult {
        let tmp = TempDir::new()?;
        let backend = LocalBackend::new(tmp.path())
            .with_signer(UrlSigner::new(b"k".to_vec()))
            .with_url_base("http://localhost:9000/t");

        let url = backend
            .presigned_url("data/a.parquet", Duration::from_secs(60))
            .await?;
        let (prefix, query) = url.split_once('?').expect("query string");
        assert_eq!(prefix, "http://localhost:9000/t/data/a.parquet");

        let mut expires = 0;
        let mut sig = "";
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("expires", v)) => expires = v.parse()?,
                Some(("sig", v)) => sig = v,
                _ => {}
            }
        }
        assert!(
            backend
                .signer()
                .verify("data/a.parquet", expires, sig, Utc::now().timestamp())
        );
        Ok(())
    }
}
