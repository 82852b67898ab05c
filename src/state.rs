//! Applier state snapshot.
//!
//! [`ApplierState`] is the single document persisted per database by the
//! status store. It carries the runtime flags guarded by the applier lock,
//! the last recorded error, the progress message, and the resume-position
//! bookkeeping the syncer needs to continue tailing after a restart.
//!
//! # Tick Semantics
//!
//! Ticks only move forward. [`ApplierState::apply_batch`] merges a batch
//! report with `max`, so a late or duplicated report never regresses the
//! resume position.

use crate::error::ErrorCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The last error recorded by the applier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastError {
    pub code: ErrorCode,
    pub message: String,
    pub time: DateTime<Utc>,
}

impl LastError {
    /// Create an error stamped with the current time.
    ///
    /// An empty message is replaced by the code's default message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            code.default_message().to_string()
        } else {
            message
        };
        Self {
            code,
            message,
            time: Utc::now(),
        }
    }
}

/// Progress reported by the syncer after applying one batch.
///
/// Tick fields left at `0` are ignored by the merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchProgress {
    pub last_processed_tick: u64,
    pub last_applied_tick: u64,
    pub last_available_tick: u64,
    pub safe_resume_tick: u64,
    pub requests: u64,
    pub events: u64,
    pub skipped: u64,
}

/// Status snapshot of one replication applier.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApplierState {
    /// A worker is executing, or was told to start and not yet observed to stop.
    #[serde(default)]
    pub active: bool,

    /// Starts are blocked by an administrative operation.
    #[serde(default)]
    pub prevent_start: bool,

    /// Any in-progress initial full synchronization should be abandoned.
    #[serde(default)]
    pub stop_initial_synchronization: bool,

    #[serde(default)]
    pub last_error: Option<LastError>,

    #[serde(default)]
    pub progress_message: String,

    #[serde(default)]
    pub progress_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_applied_continuous_tick: u64,

    #[serde(default)]
    pub last_processed_continuous_tick: u64,

    #[serde(default)]
    pub last_available_continuous_tick: u64,

    #[serde(default)]
    pub safe_resume_tick: u64,

    #[serde(default)]
    pub total_requests: u64,

    #[serde(default)]
    pub total_failed_connects: u64,

    #[serde(default)]
    pub total_events: u64,

    #[serde(default)]
    pub skipped_operations: u64,
}

impl ApplierState {
    /// Record an error, replacing any previous one.
    pub fn set_error(&mut self, code: ErrorCode, message: impl Into<String>) {
        self.last_error = Some(LastError::new(code, message));
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Set the progress message and stamp it with the current time.
    pub fn set_progress(&mut self, message: impl Into<String>) {
        self.progress_message = message.into();
        self.progress_time = Some(Utc::now());
    }

    /// Reset to defaults, keeping the runtime guards `active` and `prevent_start`.
    ///
    /// Those two flags describe the live worker and an in-flight
    /// administrative block, neither of which is recovery state.
    pub fn reset(&mut self) {
        *self = Self {
            active: self.active,
            prevent_start: self.prevent_start,
            ..Self::default()
        };
    }

    /// Clear the flags that only make sense within one process lifetime.
    ///
    /// Called on state loaded from the status store.
    pub fn clear_runtime_flags(&mut self) {
        self.active = false;
        self.prevent_start = false;
        self.stop_initial_synchronization = false;
    }

    /// Merge a batch report. Ticks never regress; counters accumulate.
    pub fn apply_batch(&mut self, batch: &BatchProgress) {
        self.last_processed_continuous_tick =
            self.last_processed_continuous_tick.max(batch.last_processed_tick);
        self.last_applied_continuous_tick =
            self.last_applied_continuous_tick.max(batch.last_applied_tick);
        self.last_available_continuous_tick =
            self.last_available_continuous_tick.max(batch.last_available_tick);
        self.safe_resume_tick = self.safe_resume_tick.max(batch.safe_resume_tick);
        self.total_requests = self.total_requests.saturating_add(batch.requests);
        self.total_events = self.total_events.saturating_add(batch.events);
        self.skipped_operations = self.skipped_operations.saturating_add(batch.skipped);
    }

    /// Tick the syncer should resume from when no explicit tick is given.
    pub fn resume_tick(&self) -> u64 {
        self.last_applied_continuous_tick
    }
}
