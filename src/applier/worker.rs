// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The applier worker task and the handle its syncer talks back through.
//!
//! # Fault Boundary
//!
//! The syncer future is polled inside `catch_unwind`. Whatever happens in
//! it, the worker task itself completes normally:
//!
//! ```text
//! syncer.run() ──► Ok(())             → nothing recorded
//!              ──► Err(Stopped)       → nothing recorded if a stop was requested
//!              ──► Err(e)             → last_error = (e.code(), message)
//!              ──► panic              → last_error = (INTERNAL, "caught exception ...")
//! ```
//!
//! Afterwards, if the applier is still marked active and no stop was
//! requested, the syncer exited on its own: the worker marks the applier
//! inactive and persists the final state.

use super::Shared;
use crate::error::{ApplierError, ErrorCode, Result};
use crate::metrics;
use crate::state::BatchProgress;
use crate::syncer::Syncer;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn, Instrument};

/// The syncer's view of its applier.
///
/// Cheap to clone. Holding a handle does not keep the worker alive.
#[derive(Clone)]
pub struct ApplierHandle {
    pub(super) shared: Arc<Shared>,
}

impl ApplierHandle {
    pub fn database(&self) -> &str {
        &self.shared.database
    }

    /// Interruptible sleep. Returns `false` as soon as a stop is observed,
    /// `true` if the full duration elapsed.
    pub async fn wait(&self, duration: Duration) -> bool {
        self.shared.wait(duration).await
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.is_terminated()
    }

    pub async fn set_error(&self, code: ErrorCode, message: impl Into<String>) {
        self.shared.set_error(code, message.into()).await;
    }

    pub async fn set_progress(&self, message: impl Into<String>) {
        self.shared.set_progress(message.into()).await;
    }

    /// An in-progress initial synchronization should be abandoned.
    pub async fn stop_initial_synchronization(&self) -> bool {
        self.shared.status.read().await.state.stop_initial_synchronization
    }

    /// Merge a batch report into the state and persist it (not synced).
    pub async fn record_batch(&self, batch: BatchProgress) -> Result<()> {
        let mut status = self.shared.status.write().await;
        status.state.apply_batch(&batch);
        self.shared.persist_locked(status, false).await
    }

    /// Count one failed connection attempt to the remote peer.
    pub async fn record_failed_connect(&self) {
        let mut status = self.shared.status.write().await;
        status.state.total_failed_connects = status.state.total_failed_connects.saturating_add(1);
    }

    pub async fn persist(&self, sync: bool) -> Result<()> {
        let status = self.shared.status.write().await;
        self.shared.persist_locked(status, sync).await
    }
}

impl std::fmt::Debug for ApplierHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplierHandle")
            .field("database", &self.shared.database)
            .finish()
    }
}

/// Body of the worker task spawned by `start`.
pub(super) async fn run_worker(
    shared: Arc<Shared>,
    syncer: Box<dyn Syncer>,
    started: oneshot::Sender<()>,
) {
    let span = tracing::info_span!("applier", database = %shared.database);

    async move {
        // start() is waiting on this
        let _ = started.send(());
        debug!("Applier worker started");

        let handle = ApplierHandle {
            shared: Arc::clone(&shared),
        };
        let outcome = AssertUnwindSafe(async move { syncer.run(handle).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => debug!("Syncer finished"),
            Ok(Err(ApplierError::Stopped)) if shared.is_terminated() => {
                debug!("Syncer stopped on request");
            }
            Ok(Err(e)) => {
                let message = match &e {
                    ApplierError::Syncer { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                shared.set_error(e.code(), message).await;
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                warn!(error = %reason, "Caught exception in applier worker");
                metrics::record_worker_panic(&shared.database);
                shared
                    .set_error(
                        ErrorCode::INTERNAL,
                        format!("caught exception in applier worker: {}", reason),
                    )
                    .await;
            }
        }

        finish(&shared).await;
    }
    .instrument(span)
    .await
}

/// Mark the applier inactive if the syncer exited without a stop request.
async fn finish(shared: &Shared) {
    let mut status = shared.status.write().await;
    if !status.state.active || shared.is_terminated() {
        return;
    }

    status.state.active = false;
    status.state.set_progress("applier stopped");
    metrics::set_applier_active(&shared.database, false);
    info!("Syncer exited, replication applier is no longer running");

    if let Err(e) = shared.persist_locked(status, false).await {
        warn!(error = %e, "Failed to persist applier state after worker exit");
    }
}

pub(super) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown exception".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_variants() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");

        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");

        let boxed: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(boxed.as_ref()), "unknown exception");
    }
}
