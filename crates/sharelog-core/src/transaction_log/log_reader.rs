//! Read-only access to the commit files of one table.
//!
//! [`TransactionLog`] lists `_delta_log/`, keeps only names that follow the
//! commit pattern, and loads individual commits through the table's
//! [`StorageBackend`]. It never writes. Each call hits storage again; there
//! is no cache of listings or parsed commits.
use std::sync::Arc;

use log::debug;
use snafu::prelude::*;

use crate::error::{EngineResult, MissingLogSnafu, StorageSnafu};
use crate::storage::StorageBackend;
use crate::transaction_log::actions::Commit;
use crate::transaction_log::layout::{LOG_DIR_NAME, commit_rel_path, parse_commit_version};

/// Handle on the transaction log of a single table.
#[derive(Debug, Clone)]
pub struct TransactionLog {
    backend: Arc<dyn StorageBackend>,
    location: String,
}

impl TransactionLog {
    /// Create a log reader over the table rooted at `backend`.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let location = backend.id().to_string();
        Self { backend, location }
    }

    /// Backend the table is stored on.
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Identity of the table location, used in error messages.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Versions of every commit file, ascending.
    ///
    /// Fails with `MissingLog` when the log directory holds no commit files.
    pub async fn list_commits(&self) -> EngineResult<Vec<u64>> {
        let names = self
            .backend
            .list_files(LOG_DIR_NAME)
            .await
            .context(StorageSnafu {
                location: self.location.clone(),
            })?;

        let mut versions: Vec<u64> = names
            .iter()
            .filter_map(|name| parse_commit_version(name))
            .collect();
        versions.sort_unstable();
        versions.dedup();

        ensure!(
            !versions.is_empty(),
            MissingLogSnafu {
                location: self.location.clone(),
            }
        );
        debug!(
            "listed {} commit(s) for {} (of {} entries)",
            versions.len(),
            self.location,
            names.len()
        );
        Ok(versions)
    }

    /// Read and parse the commit at `version`.
    ///
    /// Malformed lines are skipped inside [`Commit::parse`]; only a failure to
    /// read the file itself is returned as an error.
    pub async fn load_commit(&self, version: u64) -> EngineResult<Commit> {
        let text = self
            .backend
            .read_text(&commit_rel_path(version))
            .await
            .context(StorageSnafu {
                location: self.location.clone(),
            })?;
        Ok(Commit::parse(version, &text))
    }
}
