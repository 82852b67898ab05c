// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Syncer integration traits.
//!
//! The syncer is the collaborator that fetches the remote operation log and
//! replays it locally. The applier owns exactly one syncer per start/stop
//! cycle: it asks the [`SyncerFactory`] for a fresh one on every `start`
//! and drives its [`Syncer::run`] future on the worker task.
//!
//! A syncer must consult its [`ApplierHandle`] between units of work:
//! [`ApplierHandle::wait`] for idle sleeps and
//! [`ApplierHandle::is_terminated`] after blocking calls. Cancellation is
//! cooperative; a syncer stuck in a network call delays `stop` until that
//! call returns.
//!
//! # Example
//!
//! ```rust,no_run
//! use replication_applier::syncer::{SyncFuture, Syncer, SyncerRequest};
//! use replication_applier::{ApplierError, ApplierHandle, BatchProgress};
//! use std::time::Duration;
//!
//! struct TailingSyncer {
//!     request: SyncerRequest,
//! }
//!
//! impl Syncer for TailingSyncer {
//!     fn run(self: Box<Self>, applier: ApplierHandle) -> SyncFuture {
//!         Box::pin(async move {
//!             let mut tick = self.request.from_tick;
//!             loop {
//!                 // fetch and apply a batch starting at `tick` ...
//!                 tick += 1;
//!                 applier
//!                     .record_batch(BatchProgress {
//!                         last_applied_tick: tick,
//!                         ..Default::default()
//!                     })
//!                     .await?;
//!                 if !applier.wait(Duration::from_secs(1)).await {
//!                     return Err(ApplierError::Stopped);
//!                 }
//!             }
//!         })
//!     }
//! }
//! ```

use crate::applier::ApplierHandle;
use crate::config::ApplierConfiguration;
use crate::error::{ApplierError, Result};
use std::future::Future;
use std::pin::Pin;

/// Type alias for the boxed future returned by [`Syncer::run`].
pub type SyncFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Everything a syncer is constructed from.
#[derive(Debug, Clone)]
pub struct SyncerRequest {
    /// Tick passed to `start`.
    pub initial_tick: u64,

    /// Whether `initial_tick` is authoritative.
    pub use_tick: bool,

    /// WAL barrier held on the leader for the initial sync, 0 for none.
    pub barrier_id: u64,

    /// Tick to continue from: `initial_tick` when `use_tick`, otherwise the
    /// persisted `last_applied_continuous_tick`.
    pub from_tick: u64,

    /// Snapshot of the applier configuration at start.
    pub configuration: ApplierConfiguration,

    pub database: String,
}

/// A fetch-and-apply loop bound to one start/stop cycle.
pub trait Syncer: Send + 'static {
    /// Run until stopped or failed.
    ///
    /// `Err(ApplierError::Stopped)` is the normal way to report that the
    /// applier asked the syncer to terminate. Any other error is recorded as
    /// the applier's last error.
    fn run(self: Box<Self>, applier: ApplierHandle) -> SyncFuture;
}

/// Builds a syncer for each `start`.
pub trait SyncerFactory: Send + Sync + 'static {
    fn build(&self, request: SyncerRequest) -> Box<dyn Syncer>;
}

impl<F> SyncerFactory for F
where
    F: Fn(SyncerRequest) -> Box<dyn Syncer> + Send + Sync + 'static,
{
    fn build(&self, request: SyncerRequest) -> Box<dyn Syncer> {
        self(request)
    }
}

/// A syncer that applies nothing and idles until the applier stops it.
///
/// Used for standalone mode and tests.
#[derive(Debug, Clone)]
pub struct NoOpSyncer {
    request: SyncerRequest,
}

impl NoOpSyncer {
    pub fn new(request: SyncerRequest) -> Self {
        Self { request }
    }

    /// Factory producing [`NoOpSyncer`]s.
    pub fn factory() -> impl SyncerFactory {
        |request: SyncerRequest| Box::new(NoOpSyncer::new(request)) as Box<dyn Syncer>
    }
}

impl Syncer for NoOpSyncer {
    fn run(self: Box<Self>, applier: ApplierHandle) -> SyncFuture {
        Box::pin(async move {
            let (_, idle_max) = self.request.configuration.idle_wait_bounds();
            tracing::debug!(
                database = %self.request.database,
                from_tick = self.request.from_tick,
                "NoOp: idling until stopped"
            );
            applier.set_progress("idle").await;
            while applier.wait(idle_max).await {}
            Err(ApplierError::Stopped)
        })
    }
}
