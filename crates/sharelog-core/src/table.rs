//! Table layer.
//!
//! [`SharedTable`] is the user-facing handle on one shared table: its storage
//! backend plus the transaction log stored on it. Every call rebuilds state
//! from the log; the handle itself holds no table state.
use std::sync::Arc;

use snafu::prelude::*;

use crate::changes::{ChangeRange, ChangeSet};
use crate::error::{EngineResult, MissingMetadataSnafu};
use crate::storage::{BackendRegistry, StorageBackend, StorageResult, TableLocation};
use crate::transaction_log::{Cutoff, Metadata, TableState, TransactionLog};

/// A table exposed through the sharing protocol.
#[derive(Debug, Clone)]
pub struct SharedTable {
    log: TransactionLog,
}

impl SharedTable {
    /// Open the table rooted at `backend`.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            log: TransactionLog::new(backend),
        }
    }

    /// Open the table at `location`, sharing backends through `registry`.
    pub fn open(registry: &BackendRegistry, location: &TableLocation) -> StorageResult<Self> {
        Ok(Self::new(registry.resolve(location)?))
    }

    /// Storage backend the table lives on.
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        self.log.backend()
    }

    /// Identity of the table location (the backend id).
    pub fn location(&self) -> &str {
        self.log.location()
    }

    /// The table's transaction log.
    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    /// Resolve the table state, optionally as of `cutoff`.
    pub async fn state(&self, cutoff: Option<&Cutoff>) -> EngineResult<TableState> {
        self.log.table_state(cutoff).await
    }

    /// Resolve the table state and require that it carries metadata.
    ///
    /// Fails with `MissingMetadata` when no metadata action was folded.
    pub async fn state_with_metadata(
        &self,
        cutoff: Option<&Cutoff>,
    ) -> EngineResult<(TableState, Metadata)> {
        let state = self.state(cutoff).await?;
        let metadata = state.metadata.clone().context(MissingMetadataSnafu {
            location: self.location().to_string(),
            version: state.version_or_sentinel(),
        })?;
        Ok((state, metadata))
    }

    /// Extract the change data feed over `range` (`None` for every commit).
    pub async fn changes(&self, range: Option<ChangeRange>) -> EngineResult<ChangeSet> {
        self.log.changes(range).await
    }
}
