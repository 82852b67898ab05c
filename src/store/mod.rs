// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Persistence of applier state and configuration.
//!
//! Each database owns two records: its [`ApplierState`] snapshot and its
//! [`ApplierConfiguration`]. Records are keyed by database name.
//!
//! Two backends are provided:
//! - [`FileStatusStore`]: one JSON document per record below a directory
//! - [`SqliteStatusStore`]: one row per record in a SQLite database
//!
//! The applier never calls into a store while holding its status lock; it
//! captures the document under the lock and writes after releasing it.

mod file;
mod sqlite;

pub use file::FileStatusStore;
pub use sqlite::SqliteStatusStore;

use crate::config::{ApplierConfiguration, StatusStoreConfig};
use crate::error::Result;
use crate::state::ApplierState;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for boxed store futures.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Which record of a database is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    State,
    Configuration,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::State => "state",
            RecordKind::Configuration => "configuration",
        }
    }

    pub(crate) fn file_name(&self) -> &'static str {
        match self {
            RecordKind::State => "REPLICATION-APPLIER-STATE.json",
            RecordKind::Configuration => "REPLICATION-APPLIER-CONFIG.json",
        }
    }
}

/// Durable storage for applier records, keyed by database name.
pub trait StatusStore: Send + Sync + 'static {
    /// Load the persisted state, `None` if no record exists.
    fn load_state(&self, database: &str) -> StoreFuture<'_, Option<ApplierState>>;

    /// Write the state record. `sync` requests it be durable on return.
    fn save_state(&self, database: &str, state: &ApplierState, sync: bool) -> StoreFuture<'_, ()>;

    /// Delete the state record. Returns `false` if it was already absent.
    fn remove_state(&self, database: &str) -> StoreFuture<'_, bool>;

    fn load_configuration(&self, database: &str) -> StoreFuture<'_, Option<ApplierConfiguration>>;

    fn save_configuration(
        &self,
        database: &str,
        config: &ApplierConfiguration,
        sync: bool,
    ) -> StoreFuture<'_, ()>;
}

/// Build the configured status store backend.
pub async fn open_status_store(config: &StatusStoreConfig) -> Result<Arc<dyn StatusStore>> {
    match config {
        StatusStoreConfig::File { directory } => {
            Ok(Arc::new(FileStatusStore::new(directory).await?))
        }
        StatusStoreConfig::Sqlite { path } => Ok(Arc::new(SqliteStatusStore::new(path).await?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_record_kind_names() {
        assert_eq!(RecordKind::State.as_str(), "state");
        assert_eq!(RecordKind::Configuration.as_str(), "configuration");
        assert_ne!(
            RecordKind::State.file_name(),
            RecordKind::Configuration.file_name()
        );
    }

    #[tokio::test]
    async fn test_open_file_backend() {
        let dir = tempdir().unwrap();
        let config = StatusStoreConfig::File {
            directory: dir.path().to_string_lossy().to_string(),
        };
        let store = open_status_store(&config).await.unwrap();
        assert!(store.load_state("_system").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_sqlite_backend() {
        let store = open_status_store(&StatusStoreConfig::in_memory()).await.unwrap();
        let state = ApplierState {
            last_applied_continuous_tick: 9,
            ..Default::default()
        };
        store.save_state("_system", &state, false).await.unwrap();
        let loaded = store.load_state("_system").await.unwrap().unwrap();
        assert_eq!(loaded.last_applied_continuous_tick, 9);
    }
}
