//! In-memory backend for tests and embedding.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        RwLock,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use snafu::prelude::*;

use crate::storage::{
    NotFoundNoSourceSnafu, SigningSnafu, StorageBackend, StorageResult, UnavailableSnafu,
};

/// In-memory [`StorageBackend`] keyed by relative path.
///
/// Thread-safe via `RwLock`. Signed URLs are mock `memory://` URLs; individual
/// paths can be configured to fail signing, and every successful mint is
/// counted so callers can observe cache behavior.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    id: String,
    objects: RwLock<HashMap<String, Bytes>>,
    unsignable: RwLock<HashSet<String>>,
    urls_minted: AtomicUsize,
}

impl MemoryBackend {
    /// Create an empty backend named `name` (its id is `memory://<name>`).
    pub fn new(name: &str) -> Self {
        Self {
            id: format!("memory://{name}"),
            ..Self::default()
        }
    }

    fn poisoned<T>(&self) -> StorageResult<T> {
        UnavailableSnafu {
            backend: self.id.clone(),
            message: "lock poisoned",
        }
        .fail()
    }

    /// Store `data` at `path`, replacing any existing object.
    pub fn put(&self, path: &str, data: Bytes) -> StorageResult<()> {
        let Ok(mut objects) = self.objects.write() else {
            return self.poisoned();
        };
        objects.insert(path.trim_start_matches('/').to_string(), data);
        Ok(())
    }

    /// Store UTF-8 text at `path`.
    pub fn put_text(&self, path: &str, text: &str) -> StorageResult<()> {
        self.put(path, Bytes::copy_from_slice(text.as_bytes()))
    }

    /// Make every future `presigned_url` call for `path` fail.
    pub fn fail_signing(&self, path: &str) -> StorageResult<()> {
        let Ok(mut unsignable) = self.unsignable.write() else {
            return self.poisoned();
        };
        unsignable.insert(path.to_string());
        Ok(())
    }

    /// Number of URLs minted successfully so far.
    pub fn urls_minted(&self) -> usize {
        self.urls_minted.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn list_files(&self, dir: &str) -> StorageResult<Vec<String>> {
        let Ok(objects) = self.objects.read() else {
            return self.poisoned();
        };
        let dir = dir.trim_matches('/');
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{dir}/")
        };

        Ok(objects
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let Ok(objects) = self.objects.read() else {
            return self.poisoned();
        };
        Ok(objects.contains_key(path.trim_start_matches('/')))
    }

    async fn read_file(&self, path: &str) -> StorageResult<Bytes> {
        let Ok(objects) = self.objects.read() else {
            return self.poisoned();
        };
        objects
            .get(path.trim_start_matches('/'))
            .cloned()
            .context(NotFoundNoSourceSnafu { path })
    }

    async fn presigned_url(&self, path: &str, ttl: Duration) -> StorageResult<String> {
        let failing = match self.unsignable.read() {
            Ok(unsignable) => unsignable.contains(path),
            Err(_) => return self.poisoned(),
        };
        ensure!(
            !failing,
            SigningSnafu {
                path,
                message: "signing disabled for path",
            }
        );

        self.urls_minted.fetch_add(1, Ordering::Relaxed);
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires = Utc::now().timestamp().saturating_add(ttl_secs);
        Ok(format!(
            "{}/{}?expires={expires}&signature=mock",
            self.id,
            path.trim_start_matches('/')
        ))
    }
}
