//! JSON-file status store.
//!
//! Layout, one directory per database:
//!
//! ```text
//! <root>/<database>/REPLICATION-APPLIER-STATE.json
//! <root>/<database>/REPLICATION-APPLIER-CONFIG.json
//! ```
//!
//! Writes go to a temporary file which is renamed over the record, so a
//! crash mid-write leaves the previous document intact. With `sync` the
//! file and its directory are fsynced before returning.

use super::{RecordKind, StatusStore, StoreFuture};
use crate::config::ApplierConfiguration;
use crate::error::{ApplierError, Result};
use crate::state::ApplierState;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};

/// Status store keeping one JSON document per record.
#[derive(Debug, Clone)]
pub struct FileStatusStore {
    root: PathBuf,
}

impl FileStatusStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| ApplierError::io("create_dir", e))?;
        debug!(path = %root.display(), "Opened file status store");
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a database's record.
    ///
    /// Database names that could escape the root are rejected.
    pub fn record_path(&self, database: &str, kind: RecordKind) -> Result<PathBuf> {
        validate_database_name(database)?;
        Ok(self.root.join(database).join(kind.file_name()))
    }

    async fn read_record<T: DeserializeOwned>(path: PathBuf) -> Result<Option<T>> {
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ApplierError::io("read_record", e)),
        };
        trace!(path = %path.display(), len = bytes.len(), "Read status record");
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn write_record(path: PathBuf, bytes: Vec<u8>, sync: bool) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| ApplierError::io_msg("write_record", "record path has no parent"))?
            .to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ApplierError::io("create_dir", e))?;

        let tmp = path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| ApplierError::io("create_temp", e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| ApplierError::io("write_record", e))?;
        file.flush()
            .await
            .map_err(|e| ApplierError::io("write_record", e))?;
        if sync {
            file.sync_all()
                .await
                .map_err(|e| ApplierError::io("sync_record", e))?;
        }
        drop(file);

        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| ApplierError::io("rename_record", e))?;

        if sync {
            sync_dir(&dir).await?;
        }

        trace!(path = %path.display(), sync, "Wrote status record");
        Ok(())
    }
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<()> {
    let handle = tokio::fs::File::open(dir)
        .await
        .map_err(|e| ApplierError::io("sync_dir", e))?;
    handle
        .sync_all()
        .await
        .map_err(|e| ApplierError::io("sync_dir", e))
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

fn validate_database_name(database: &str) -> Result<()> {
    let invalid = database.is_empty()
        || database == "."
        || database == ".."
        || database.contains(&['/', '\\', '\0'][..]);
    if invalid {
        return Err(ApplierError::InvalidConfiguration(format!(
            "invalid database name for status record: {:?}",
            database
        )));
    }
    Ok(())
}

impl StatusStore for FileStatusStore {
    fn load_state(&self, database: &str) -> StoreFuture<'_, Option<ApplierState>> {
        let path = self.record_path(database, RecordKind::State);
        Box::pin(async move { Self::read_record(path?).await })
    }

    fn save_state(&self, database: &str, state: &ApplierState, sync: bool) -> StoreFuture<'_, ()> {
        let path = self.record_path(database, RecordKind::State);
        let state = state.clone();
        Box::pin(async move {
            let bytes = serde_json::to_vec_pretty(&state)?;
            Self::write_record(path?, bytes, sync).await
        })
    }

    fn remove_state(&self, database: &str) -> StoreFuture<'_, bool> {
        let path = self.record_path(database, RecordKind::State);
        Box::pin(async move {
            let path = path?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    trace!(path = %path.display(), "Removed status record");
                    Ok(true)
                }
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(ApplierError::io("remove_state", e)),
            }
        })
    }

    fn load_configuration(&self, database: &str) -> StoreFuture<'_, Option<ApplierConfiguration>> {
        let path = self.record_path(database, RecordKind::Configuration);
        Box::pin(async move { Self::read_record(path?).await })
    }

    fn save_configuration(
        &self,
        database: &str,
        config: &ApplierConfiguration,
        sync: bool,
    ) -> StoreFuture<'_, ()> {
        let path = self.record_path(database, RecordKind::Configuration);
        let config = config.clone();
        Box::pin(async move {
            let bytes = serde_json::to_vec_pretty(&config)?;
            Self::write_record(path?, bytes, sync).await
        })
    }
}
