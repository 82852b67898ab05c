// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite status store.
//!
//! All databases share one table, one row per `(database, kind)`:
//!
//! ```text
//! applier_status
//! ├── database    TEXT     -- database name
//! ├── kind        TEXT     -- "state" | "configuration"
//! ├── document    TEXT     -- JSON record
//! └── updated_at  INTEGER  -- unix millis of the last write
//! ```
//!
//! # SQLite Busy Handling
//!
//! SQLite can return SQLITE_BUSY/SQLITE_LOCKED when the file is contended
//! (e.g. a backup tool holding a read transaction). Every statement is
//! retried with exponential backoff before the error is surfaced.
//!
//! # Durability
//!
//! The pool runs in WAL mode with `synchronous = NORMAL`. A write with
//! `sync = true` is followed by a full WAL checkpoint so the record is in
//! the main database file when the call returns.
//!
//! The special path `:memory:` opens a private in-memory database on a
//! single connection. It is meant for tests.

use super::{RecordKind, StatusStore, StoreFuture};
use crate::config::ApplierConfiguration;
use crate::error::{ApplierError, Result};
use crate::state::ApplierState;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

const SQLITE_RETRY_MAX_ATTEMPTS: u32 = 5;
const SQLITE_RETRY_BASE_DELAY_MS: u64 = 10;
const SQLITE_RETRY_MAX_DELAY_MS: u64 = 500;

const IN_MEMORY_PATH: &str = ":memory:";

/// Check if an error is a retryable SQLite busy/locked error
fn is_sqlite_busy_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => {
            // SQLITE_BUSY = 5, SQLITE_LOCKED = 6
            if let Some(code) = db_err.code() {
                return code == "5" || code == "6";
            }
            let msg = db_err.message().to_lowercase();
            msg.contains("database is locked") || msg.contains("database is busy")
        }
        _ => false,
    }
}

/// Execute a statement, retrying on SQLITE_BUSY/SQLITE_LOCKED.
async fn execute_with_retry<F, Fut, T>(
    operation_name: &str,
    mut f: F,
) -> std::result::Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, sqlx::Error>>,
{
    let mut attempts = 0;
    let mut delay_ms = SQLITE_RETRY_BASE_DELAY_MS;

    loop {
        attempts += 1;
        match f().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!(
                        operation = operation_name,
                        attempts, "SQLite statement succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if is_sqlite_busy_error(&e) && attempts < SQLITE_RETRY_MAX_ATTEMPTS => {
                warn!(
                    operation = operation_name,
                    attempts,
                    max_attempts = SQLITE_RETRY_MAX_ATTEMPTS,
                    delay_ms,
                    "SQLite busy, retrying"
                );
                crate::metrics::record_status_store_retry(operation_name);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms = (delay_ms * 2).min(SQLITE_RETRY_MAX_DELAY_MS);
            }
            Err(e) => {
                if is_sqlite_busy_error(&e) {
                    warn!(
                        operation = operation_name,
                        attempts, "SQLite busy, max retries exceeded"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Status store backed by a SQLite database.
pub struct SqliteStatusStore {
    pool: SqlitePool,
    path: String,
    in_memory: bool,
}

impl SqliteStatusStore {
    /// Open (or create) the store at `path`.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().to_string();
        let in_memory = path == IN_MEMORY_PATH;
        info!(path = %path, in_memory, "Initializing SQLite status store");

        let pool = if in_memory {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
            // every connection would get its own empty database
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            let options = SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", path))
                .map_err(|e| {
                    ApplierError::InvalidConfiguration(format!("Invalid SQLite path: {}", e))
                })?
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(2)
                .connect_with(options)
                .await?
        };

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS applier_status (
                database TEXT NOT NULL,
                kind TEXT NOT NULL,
                document TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (database, kind)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        let (records,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM applier_status")
            .fetch_one(&pool)
            .await?;
        if records > 0 {
            info!(records, "Found persisted applier records");
        }

        Ok(Self {
            pool,
            path,
            in_memory,
        })
    }

    /// Database path (for diagnostics).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Flush the WAL into the main database file.
    pub async fn checkpoint(&self) -> Result<()> {
        if self.in_memory {
            return Ok(());
        }
        let pool = &self.pool;
        execute_with_retry("status_checkpoint", || async {
            sqlx::query("PRAGMA wal_checkpoint(FULL)")
                .execute(pool)
                .await
        })
        .await?;
        trace!("WAL checkpoint complete");
        Ok(())
    }

    /// Checkpoint and close the pool.
    pub async fn close(&self) {
        if let Err(e) = self.checkpoint().await {
            warn!(error = %e, "Failed to checkpoint WAL on close");
        }
        self.pool.close().await;
        info!(path = %self.path, "Status store closed");
    }

    async fn read_record<T: DeserializeOwned>(
        &self,
        database: &str,
        kind: RecordKind,
    ) -> Result<Option<T>> {
        let pool = &self.pool;
        let row: Option<(String,)> = execute_with_retry("status_load", || async {
            sqlx::query_as("SELECT document FROM applier_status WHERE database = ? AND kind = ?")
                .bind(database)
                .bind(kind.as_str())
                .fetch_optional(pool)
                .await
        })
        .await?;

        match row {
            Some((document,)) => Ok(Some(serde_json::from_str(&document)?)),
            None => Ok(None),
        }
    }

    async fn write_record<T: Serialize>(
        &self,
        database: &str,
        kind: RecordKind,
        record: &T,
        sync: bool,
    ) -> Result<()> {
        let document = serde_json::to_string(record)?;
        let now = chrono::Utc::now().timestamp_millis();
        let pool = &self.pool;

        execute_with_retry("status_save", || async {
            sqlx::query(
                r#"
                INSERT INTO applier_status (database, kind, document, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(database, kind) DO UPDATE SET
                    document = excluded.document,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(database)
            .bind(kind.as_str())
            .bind(&document)
            .bind(now)
            .execute(pool)
            .await
        })
        .await?;

        trace!(database, kind = kind.as_str(), sync, "Wrote status record");
        if sync {
            self.checkpoint().await?;
        }
        Ok(())
    }
}

impl StatusStore for SqliteStatusStore {
    fn load_state(&self, database: &str) -> StoreFuture<'_, Option<ApplierState>> {
        let database = database.to_string();
        Box::pin(async move { self.read_record(&database, RecordKind::State).await })
    }

    fn save_state(&self, database: &str, state: &ApplierState, sync: bool) -> StoreFuture<'_, ()> {
        let database = database.to_string();
        let state = state.clone();
        Box::pin(async move {
            self.write_record(&database, RecordKind::State, &state, sync)
                .await
        })
    }

    fn remove_state(&self, database: &str) -> StoreFuture<'_, bool> {
        let database = database.to_string();
        Box::pin(async move {
            let pool = &self.pool;
            let result = execute_with_retry("status_remove", || async {
                sqlx::query("DELETE FROM applier_status WHERE database = ? AND kind = ?")
                    .bind(&database)
                    .bind(RecordKind::State.as_str())
                    .execute(pool)
                    .await
            })
            .await?;
            let removed = result.rows_affected() > 0;
            trace!(database = %database, removed, "Removed status record");
            Ok(removed)
        })
    }

    fn load_configuration(&self, database: &str) -> StoreFuture<'_, Option<ApplierConfiguration>> {
        let database = database.to_string();
        Box::pin(async move { self.read_record(&database, RecordKind::Configuration).await })
    }

    fn save_configuration(
        &self,
        database: &str,
        config: &ApplierConfiguration,
        sync: bool,
    ) -> StoreFuture<'_, ()> {
        let database = database.to_string();
        let config = config.clone();
        Box::pin(async move {
            self.write_record(&database, RecordKind::Configuration, &config, sync)
                .await
        })
    }
}
