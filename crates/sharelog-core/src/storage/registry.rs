use std::{
    collections::HashMap,
    fmt,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use snafu::prelude::*;

use crate::storage::{
    InvalidLocationSnafu, LocalBackend, MemoryBackend, StorageBackend, StorageResult, UrlSigner,
};

/// Physical location of a table root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableLocation {
    /// A table stored on the local filesystem at the given path.
    Local(PathBuf),
    /// A table held by a named [`MemoryBackend`] registered with the registry.
    Memory(String),
}

impl TableLocation {
    /// Creates a new `TableLocation` for a local filesystem path.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        TableLocation::Local(root.into())
    }

    /// Parse a user-facing location string.
    ///
    /// Accepted forms: a plain path, a `file://` URI, or `memory://<name>`.
    /// Cloud schemes are recognized and rejected with a clear message.
    pub fn parse(spec: &str) -> StorageResult<Self> {
        let trimmed = spec.trim();
        ensure!(
            !trimmed.is_empty(),
            InvalidLocationSnafu {
                spec,
                message: "location is empty",
            }
        );

        if let Some(rest) = trimmed.strip_prefix("file://") {
            return Ok(TableLocation::Local(PathBuf::from(rest)));
        }
        if let Some(name) = trimmed.strip_prefix("memory://") {
            ensure!(
                !name.is_empty(),
                InvalidLocationSnafu {
                    spec,
                    message: "memory location needs a name",
                }
            );
            return Ok(TableLocation::Memory(name.trim_end_matches('/').to_string()));
        }
        if let Some((scheme, _)) = trimmed.split_once("://") {
            return InvalidLocationSnafu {
                spec,
                message: format!("unsupported storage scheme {scheme:?}"),
            }
            .fail();
        }
        Ok(TableLocation::Local(PathBuf::from(trimmed)))
    }

    fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TableLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableLocation::Local(root) => write!(f, "file://{}", root.display()),
            TableLocation::Memory(name) => write!(f, "memory://{name}"),
        }
    }
}

/// Caller-owned registry of backend instances keyed by table location.
///
/// Backends are created lazily on first use and then shared. Cloning the
/// registry shares the same underlying map.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: Arc<Mutex<HashMap<String, Arc<dyn StorageBackend>>>>,
    signing_secret: Option<Vec<u8>>,
    url_base: Option<String>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let locations: Vec<String> = self
            .backends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        f.debug_struct("BackendRegistry")
            .field("locations", &locations)
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("url_base", &self.url_base)
            .finish()
    }
}

impl BackendRegistry {
    /// Create an empty registry; local backends get ephemeral signing secrets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed secret for URLs minted by local backends.
    pub fn with_signing_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.signing_secret = Some(secret.into());
        self
    }

    /// Render local signed URLs under `base` (`<base>/<table dir name>/<path>`).
    pub fn with_url_base(mut self, base: impl Into<String>) -> Self {
        self.url_base = Some(base.into());
        self
    }

    /// Register an explicit backend for `location`, replacing any previous one.
    pub fn register(&self, location: &TableLocation, backend: Arc<dyn StorageBackend>) {
        self.backends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location.key(), backend);
    }

    /// Number of backends currently held.
    pub fn len(&self) -> usize {
        self.backends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true when no backend has been created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the backend for `location`, creating a local one on first use.
    ///
    /// Memory locations must have been registered beforehand.
    pub fn resolve(&self, location: &TableLocation) -> StorageResult<Arc<dyn StorageBackend>> {
        let mut backends = self
            .backends
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let key = location.key();
        if let Some(existing) = backends.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let backend: Arc<dyn StorageBackend> = match location {
            TableLocation::Local(root) => Arc::new(self.local_backend(root)),
            TableLocation::Memory(name) => {
                return InvalidLocationSnafu {
                    spec: key,
                    message: format!("no in-memory table registered as {name:?}"),
                }
                .fail();
            }
        };
        backends.insert(key, Arc::clone(&backend));
        Ok(backend)
    }

    fn local_backend(&self, root: &std::path::Path) -> LocalBackend {
        let mut backend = LocalBackend::new(root);
        if let Some(secret) = &self.signing_secret {
            backend = backend.with_signer(UrlSigner::new(secret.clone()));
        }
        if let Some(base) = &self.url_base {
            let table_dir = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let base = base.trim_end_matches('/');
            backend = backend.with_url_base(format!("{base}/{table_dir}"));
        }
        backend
    }

    /// Register a fresh [`MemoryBackend`] under `memory://<name>` and return it.
    pub fn memory(&self, name: &str) -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new(name));
        self.register(
            &TableLocation::Memory(name.to_string()),
            Arc::clone(&backend) as Arc<dyn StorageBackend>,
        );
        backend
    }
}
