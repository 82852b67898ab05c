// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the replication applier and endpoint discovery.
//!
//! Lifecycle operations fail synchronously to their caller with an
//! [`ApplierError`]. Failures inside the applier worker never reach the
//! caller of `start`; they are folded into the applier's `last_error` as an
//! [`ErrorCode`] plus message.
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `AlreadyRunning` | No | Operation needs an inactive applier |
//! | `Blocked` | Yes | Start prevented by an administrative operation |
//! | `AlreadyLocked` | Yes | Someone else already prevented starts |
//! | `InvalidConfiguration` | No | Endpoint or database missing |
//! | `Internal` | No | Misuse of the API or unexpected fault |
//! | `Io` / `StatusStore` / `Serialization` | No | Status record read/write/delete failed |
//! | `ConsensusUnavailable` | Yes | Consensus store read transaction failed |
//! | `Forbidden` | No | Wrong method, suffix, role or feature disabled |
//! | `Syncer` | Depends | Error reported by the syncer collaborator |
//! | `Stopped` | No | Applier was asked to stop |

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for applier operations.
pub type Result<T> = std::result::Result<T, ApplierError>;

/// Numeric error number as reported in status documents and HTTP bodies.
///
/// The syncer may record codes outside the named constants; the type is a
/// transparent wrapper so any value round-trips through the status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    pub const NO_ERROR: Self = Self(0);
    pub const INTERNAL: Self = Self(4);
    pub const FORBIDDEN: Self = Self(11);
    pub const CANNOT_WRITE_FILE: Self = Self(15);
    pub const LOCKED: Self = Self(28);
    pub const REPLICATION_NO_RESPONSE: Self = Self(1400);
    pub const REPLICATION_INVALID_RESPONSE: Self = Self(1401);
    pub const REPLICATION_MASTER_ERROR: Self = Self(1402);
    pub const REPLICATION_INVALID_APPLIER_CONFIGURATION: Self = Self(1410);
    pub const REPLICATION_RUNNING: Self = Self(1411);
    /// Expected terminal condition; recorded but never logged as an error.
    pub const REPLICATION_APPLIER_STOPPED: Self = Self(1412);
    pub const CLUSTER_TIMEOUT: Self = Self(1457);
    pub const CLUSTER_BACKEND_UNAVAILABLE: Self = Self(1478);

    /// Default message for a code when the caller supplied none.
    pub fn default_message(self) -> &'static str {
        match self {
            Self::NO_ERROR => "no error",
            Self::INTERNAL => "internal error",
            Self::FORBIDDEN => "forbidden",
            Self::CANNOT_WRITE_FILE => "cannot write file",
            Self::LOCKED => "locked",
            Self::REPLICATION_NO_RESPONSE => "no response",
            Self::REPLICATION_INVALID_RESPONSE => "invalid response",
            Self::REPLICATION_MASTER_ERROR => "master error",
            Self::REPLICATION_INVALID_APPLIER_CONFIGURATION => "invalid replication applier configuration",
            Self::REPLICATION_RUNNING => "cannot perform operation while applier is running",
            Self::REPLICATION_APPLIER_STOPPED => "replication stopped",
            Self::CLUSTER_TIMEOUT => "timeout in cluster operation",
            Self::CLUSTER_BACKEND_UNAVAILABLE => "a cluster backend which was required for the operation could not be reached",
            _ => "unknown error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors returned by applier lifecycle operations and endpoint discovery.
#[derive(Error, Debug)]
pub enum ApplierError {
    /// The operation requires the applier to be inactive.
    #[error("Replication applier is running")]
    AlreadyRunning,

    /// `start()` was called while starts are prevented.
    #[error("Replication applier start is blocked")]
    Blocked,

    /// `prevent_start()` was called while someone else already holds the block.
    #[error("Replication applier start is already prevented")]
    AlreadyLocked,

    /// Endpoint or database name missing.
    #[error("Invalid applier configuration: {0}")]
    InvalidConfiguration(String),

    /// Misuse of the API (e.g. `allow_start()` without `prevent_start()`)
    /// or an unexpected fault.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Filesystem error while reading, writing or deleting a status record.
    #[error("Status store error ({operation}): {message}")]
    Io {
        operation: String,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// SQLite error in the status store.
    #[error("Status store error: {0}")]
    StatusStore(#[from] sqlx::Error),

    /// Status record could not be encoded or decoded.
    #[error("Status record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The consensus store read transaction failed.
    ///
    /// Carries the store's own error code and message.
    #[error("Consensus store error ({code}): {message}")]
    ConsensusUnavailable { code: i32, message: String },

    /// Wrong method, path suffix, server role, or feature disabled.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Error reported by the syncer while fetching or applying operations.
    #[error("Syncer error ({code}): {message}")]
    Syncer { code: ErrorCode, message: String },

    /// The applier was asked to stop while the syncer was running.
    #[error("Replication applier stopped")]
    Stopped,
}

impl ApplierError {
    /// Create an I/O error with operation context.
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create an I/O error without an underlying source.
    pub fn io_msg(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a syncer error.
    pub fn syncer(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Syncer {
            code,
            message: message.into(),
        }
    }

    /// The error number recorded in `last_error` and reported over HTTP.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::AlreadyRunning => ErrorCode::REPLICATION_RUNNING,
            Self::Blocked | Self::AlreadyLocked => ErrorCode::LOCKED,
            Self::InvalidConfiguration(_) => ErrorCode::REPLICATION_INVALID_APPLIER_CONFIGURATION,
            Self::Internal(_) => ErrorCode::INTERNAL,
            Self::Io { .. } | Self::StatusStore(_) | Self::Serialization(_) => {
                ErrorCode::CANNOT_WRITE_FILE
            }
            Self::ConsensusUnavailable { code, .. } => ErrorCode(*code),
            Self::Forbidden(_) => ErrorCode::FORBIDDEN,
            Self::Syncer { code, .. } => *code,
            Self::Stopped => ErrorCode::REPLICATION_APPLIER_STOPPED,
        }
    }

    /// Check if the caller may retry the operation later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Blocked => true, // administrative block is temporary
            Self::AlreadyLocked => true,
            Self::ConsensusUnavailable { .. } => true,
            Self::Syncer { code, .. } => matches!(
                *code,
                ErrorCode::REPLICATION_NO_RESPONSE | ErrorCode::CLUSTER_TIMEOUT
            ),
            Self::AlreadyRunning => false,
            Self::InvalidConfiguration(_) => false,
            Self::Internal(_) => false,
            Self::Io { .. } | Self::StatusStore(_) | Self::Serialization(_) => false,
            Self::Forbidden(_) => false,
            Self::Stopped => false,
        }
    }

    /// HTTP status used when the error is returned from a REST handler.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyRunning | Self::Blocked | Self::AlreadyLocked => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
