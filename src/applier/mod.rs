// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replication applier controller.
//!
//! One [`ReplicationApplier`] per database. It guards the applier
//! configuration, the [`ApplierState`] and the handle of the single worker
//! task under one `RwLock`, and drives the worker through its lifecycle.
//!
//! # State Machine
//!
//! ```text
//!                 prevent_start()                    start()
//!   Blocked ◄──────────────────── Idle ─────────────────────────► Running
//!  (prevent_start)  allow_start()  (¬active)  stop() / shutdown()  (active)
//!           ─────────────────────►         ◄─────────────────────
//!                                          ◄── syncer exits ─────
//! ```
//!
//! # Locking Rules
//!
//! The status lock is never held across an await that can block for long:
//! - joining the worker (unbounded) happens after the guard is dropped
//! - status records are snapshotted under the lock and written after it is
//!   released, ordered by a per-record sequence number so a slow older write
//!   never overwrites a newer one
//!
//! # Teardown
//!
//! The termination signal (a `watch` channel) is raised by `stop`/`shutdown`
//! and stays raised until whoever took the worker handle has joined it.
//! The join itself runs in a detached teardown task, so a caller that gives
//! up waiting (a timeout, a dropped request) cannot leave the signal raised.
//! `start` never spawns while the signal is raised or a stale handle is
//! still in the slot, so two workers never coexist.

mod types;
mod worker;

pub use types::{
    ApplierStatusReport, LastErrorReport, ProgressReport, ServerInfo, ServerReport, StateReport,
};
pub use worker::ApplierHandle;

use crate::config::ApplierConfiguration;
use crate::error::{ApplierError, ErrorCode, Result};
use crate::metrics;
use crate::state::ApplierState;
use crate::store::StatusStore;
use crate::syncer::{SyncerFactory, SyncerRequest};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch, Mutex, RwLock, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Granularity of [`ReplicationApplier::wait`]; bounds cancellation latency.
pub const WAIT_CHUNK: Duration = Duration::from_millis(500);

/// Everything guarded by the status lock.
struct ApplierStatus {
    configuration: ApplierConfiguration,
    state: ApplierState,
    worker: Option<JoinHandle<()>>,
}

/// Orders writes of one status record.
///
/// Tickets are drawn under the status lock, so ticket order is mutation
/// order. A write whose ticket is older than the last one written is
/// dropped.
struct PersistSlot {
    issued: AtomicU64,
    written: Mutex<u64>,
}

impl PersistSlot {
    fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
            written: Mutex::new(0),
        }
    }

    fn ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn run<T>(&self, ticket: u64, write: impl Future<Output = Result<T>>) -> Result<Option<T>> {
        let mut written = self.written.lock().await;
        if *written > ticket {
            trace!(ticket, written = *written, "Skipping superseded status write");
            return Ok(None);
        }
        let value = write.await?;
        *written = ticket;
        Ok(Some(value))
    }
}

pub(crate) struct Shared {
    database: String,
    status: RwLock<ApplierStatus>,
    termination: watch::Sender<bool>,
    store: Arc<dyn StatusStore>,
    factory: Arc<dyn SyncerFactory>,
    server: ServerInfo,
    state_slot: PersistSlot,
    config_slot: PersistSlot,
}

impl Shared {
    fn is_terminated(&self) -> bool {
        *self.termination.borrow()
    }

    async fn wait(&self, duration: Duration) -> bool {
        if self.is_terminated() {
            return false;
        }
        trace!(database = %self.database, ?duration, "Applier going to sleep");

        let mut remaining = duration;
        while !remaining.is_zero() {
            let chunk = remaining.min(WAIT_CHUNK);
            tokio::time::sleep(chunk).await;
            remaining -= chunk;
            if self.is_terminated() {
                return false;
            }
        }
        true
    }

    /// Wait until no teardown is in flight.
    async fn await_teardown(&self) {
        let mut rx = self.termination.subscribe();
        // the sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|raised| !*raised).await;
    }

    /// Join a worker whose handle was taken from the slot, then lower the
    /// termination signal.
    ///
    /// The join runs in its own task: once the handle has left the slot,
    /// the signal must come down even if the caller stops waiting.
    async fn join_worker(self: &Arc<Self>, handle: JoinHandle<()>) {
        let shared = Arc::clone(self);
        let teardown = tokio::spawn(async move {
            if let Err(e) = handle.await {
                warn!(database = %shared.database, error = %e, "Applier worker task failed");
            }
            shared.termination.send_replace(false);
        });
        if let Err(e) = teardown.await {
            warn!(database = %self.database, error = %e, "Applier teardown task failed");
        }
    }

    async fn set_error(&self, code: ErrorCode, message: String) {
        let mut status = self.status.write().await;
        self.set_error_locked(&mut status.state, code, message);
    }

    fn set_error_locked(&self, state: &mut ApplierState, code: ErrorCode, message: String) {
        state.set_error(code, message);
        if code != ErrorCode::REPLICATION_APPLIER_STOPPED {
            if let Some(err) = &state.last_error {
                error!(
                    database = %self.database,
                    code = code.0,
                    error = %err.message,
                    "Replication applier error"
                );
            }
        }
        metrics::record_applier_error(&self.database, code);
    }

    async fn set_progress(&self, message: String) {
        let mut status = self.status.write().await;
        trace!(database = %self.database, progress = %message, "Applier progress");
        status.state.set_progress(message);
    }

    /// Persist the state snapshot held by `status`, releasing the lock before
    /// the write.
    async fn persist_locked(
        &self,
        status: RwLockWriteGuard<'_, ApplierStatus>,
        sync: bool,
    ) -> Result<()> {
        let ticket = self.state_slot.ticket();
        let snapshot = status.state.clone();
        drop(status);

        let started = Instant::now();
        let result = self
            .state_slot
            .run(ticket, self.store.save_state(&self.database, &snapshot, sync))
            .await;
        metrics::record_status_persist(&self.database, result.is_ok(), started.elapsed());

        match result {
            Ok(written) => {
                trace!(
                    database = %self.database,
                    sync,
                    written = written.is_some(),
                    "Saved replication applier state"
                );
                Ok(())
            }
            Err(e) => {
                warn!(database = %self.database, error = %e, "Failed to save applier state");
                Err(e)
            }
        }
    }

    async fn save_configuration_locked(
        &self,
        status: RwLockWriteGuard<'_, ApplierStatus>,
        sync: bool,
    ) -> Result<()> {
        let ticket = self.config_slot.ticket();
        let snapshot = status.configuration.clone();
        drop(status);

        self.config_slot
            .run(
                ticket,
                self.store.save_configuration(&self.database, &snapshot, sync),
            )
            .await?;
        debug!(database = %self.database, endpoint = %snapshot.endpoint, "Saved applier configuration");
        Ok(())
    }
}

/// Controller of the replication applier of one database.
///
/// Cloning yields another handle to the same applier.
#[derive(Clone)]
pub struct ReplicationApplier {
    shared: Arc<Shared>,
}

impl ReplicationApplier {
    /// Open the applier of `database`.
    ///
    /// Loads the persisted configuration and state (or defaults) and clears
    /// the runtime flags left over from a previous process.
    pub async fn open(
        database: impl Into<String>,
        store: Arc<dyn StatusStore>,
        factory: Arc<dyn SyncerFactory>,
        server: ServerInfo,
    ) -> Result<Self> {
        let database = database.into();

        let configuration = store
            .load_configuration(&database)
            .await?
            .unwrap_or_default();
        let mut state = store.load_state(&database).await?.unwrap_or_default();
        state.clear_runtime_flags();
        state.set_progress(format!("applier initially created for {}", database));

        info!(
            database = %database,
            endpoint = %configuration.endpoint,
            resume_tick = state.resume_tick(),
            auto_start = configuration.auto_start,
            "Opened replication applier"
        );
        metrics::set_applier_active(&database, false);

        let (termination, _) = watch::channel(false);
        Ok(Self {
            shared: Arc::new(Shared {
                database,
                status: RwLock::new(ApplierStatus {
                    configuration,
                    state,
                    worker: None,
                }),
                termination,
                store,
                factory,
                server,
                state_slot: PersistSlot::new(),
                config_slot: PersistSlot::new(),
            }),
        })
    }

    pub fn database(&self) -> &str {
        &self.shared.database
    }

    pub async fn is_running(&self) -> bool {
        self.shared.status.read().await.state.active
    }

    pub async fn auto_start(&self) -> bool {
        self.shared.status.read().await.configuration.auto_start
    }

    pub async fn configuration(&self) -> ApplierConfiguration {
        self.shared.status.read().await.configuration.clone()
    }

    /// Copy of the current state.
    pub async fn state(&self) -> ApplierState {
        self.shared.status.read().await.state.clone()
    }

    pub async fn stop_initial_synchronization(&self) -> bool {
        self.shared.status.read().await.state.stop_initial_synchronization
    }

    pub async fn set_stop_initial_synchronization(&self, value: bool) {
        self.shared.status.write().await.state.stop_initial_synchronization = value;
    }

    /// Block starts during an administrative operation.
    pub async fn prevent_start(&self) -> Result<()> {
        let mut status = self.shared.status.write().await;
        if status.state.active {
            return Err(ApplierError::AlreadyRunning);
        }
        if status.state.prevent_start {
            return Err(ApplierError::AlreadyLocked);
        }
        status.state.stop_initial_synchronization = false;
        status.state.prevent_start = true;
        debug!(database = %self.shared.database, "Applier start prevented");
        Ok(())
    }

    /// Lift a block installed by [`prevent_start`](Self::prevent_start).
    pub async fn allow_start(&self) -> Result<()> {
        let mut status = self.shared.status.write().await;
        if !status.state.prevent_start {
            return Err(ApplierError::Internal(
                "allow_start called without prevent_start".to_string(),
            ));
        }
        status.state.stop_initial_synchronization = false;
        status.state.prevent_start = false;
        debug!(database = %self.shared.database, "Applier start allowed");
        Ok(())
    }

    /// Start the worker.
    ///
    /// With `use_tick` the syncer resumes from `initial_tick`, otherwise from
    /// the persisted last applied tick. Returns once the worker task is
    /// executing. Starting an active applier is a no-op.
    ///
    /// Failures inside the worker are recorded in `last_error` and never
    /// returned from here.
    pub async fn start(&self, initial_tick: u64, use_tick: bool, barrier_id: u64) -> Result<()> {
        let shared = &self.shared;
        debug!(
            database = %shared.database,
            initial_tick,
            use_tick,
            barrier_id,
            "Requesting replication applier start"
        );

        let mut status = loop {
            let mut status = shared.status.write().await;
            if !status.state.active {
                if let Some(stale) = status.worker.take() {
                    // a worker stopped without join, or one that exited on its own
                    shared.termination.send_replace(true);
                    drop(status);
                    shared.join_worker(stale).await;
                    continue;
                }
                if shared.is_terminated() {
                    drop(status);
                    shared.await_teardown().await;
                    continue;
                }
            }
            break status;
        };

        if status.state.prevent_start {
            metrics::record_applier_start(&shared.database, "blocked");
            return Err(ApplierError::Blocked);
        }
        if status.state.active {
            return Ok(());
        }

        let missing = if status.configuration.endpoint.is_empty() {
            Some("no endpoint configured")
        } else if status.configuration.database.is_empty() {
            Some("no database configured")
        } else {
            None
        };
        if let Some(message) = missing {
            shared.set_error_locked(
                &mut status.state,
                ErrorCode::REPLICATION_INVALID_APPLIER_CONFIGURATION,
                message.to_string(),
            );
            metrics::record_applier_start(&shared.database, "invalid_configuration");
            return Err(ApplierError::InvalidConfiguration(message.to_string()));
        }

        let request = SyncerRequest {
            initial_tick,
            use_tick,
            barrier_id,
            from_tick: if use_tick {
                initial_tick
            } else {
                status.state.resume_tick()
            },
            configuration: status.configuration.clone(),
            database: shared.database.clone(),
        };
        let from_tick = request.from_tick;
        let endpoint = request.configuration.endpoint.clone();
        let syncer = match panic::catch_unwind(AssertUnwindSafe(|| shared.factory.build(request))) {
            Ok(syncer) => syncer,
            Err(panic) => {
                let message = format!(
                    "caught exception while creating syncer: {}",
                    worker::panic_message(panic.as_ref())
                );
                warn!(database = %shared.database, error = %message, "Failed to create syncer");
                shared.set_error_locked(&mut status.state, ErrorCode::INTERNAL, message.clone());
                metrics::record_applier_start(&shared.database, "failed");
                return Err(ApplierError::Internal(message));
            }
        };

        status.state.clear_error();
        shared.termination.send_replace(false);
        status.state.active = true;

        let (started_tx, started_rx) = oneshot::channel();
        status.worker = Some(tokio::spawn(worker::run_worker(
            Arc::clone(shared),
            syncer,
            started_tx,
        )));
        metrics::set_applier_active(&shared.database, true);
        drop(status);

        if started_rx.await.is_err() {
            let mut status = shared.status.write().await;
            status.state.active = false;
            metrics::set_applier_active(&shared.database, false);
            let message = "could not start applier worker".to_string();
            shared.set_error_locked(&mut status.state, ErrorCode::INTERNAL, message.clone());
            metrics::record_applier_start(&shared.database, "failed");
            return Err(ApplierError::Internal(message));
        }

        metrics::record_applier_start(&shared.database, "started");
        if use_tick {
            info!(
                database = %shared.database,
                endpoint = %endpoint,
                tick = initial_tick,
                "Started replication applier"
            );
        } else {
            info!(
                database = %shared.database,
                endpoint = %endpoint,
                tick = from_tick,
                "Re-started replication applier"
            );
        }
        Ok(())
    }

    /// Stop the worker.
    ///
    /// Always abandons any initial synchronization. No-op when inactive.
    /// With `join_worker` this waits (without the lock) until the worker has
    /// exited; otherwise the termination signal stays raised until a later
    /// `start` or `shutdown` joins it.
    pub async fn stop(&self, reset_error: bool, join_worker: bool) {
        let shared = &self.shared;
        let handle = {
            let mut status = shared.status.write().await;
            status.state.stop_initial_synchronization = true;

            if !status.state.active {
                return;
            }

            status.state.active = false;
            shared.termination.send_replace(true);
            status.state.set_progress("applier shut down");
            if reset_error {
                status.state.clear_error();
            }
            metrics::set_applier_active(&shared.database, false);

            if join_worker {
                status.worker.take()
            } else {
                None
            }
        };

        if let Some(handle) = handle {
            shared.join_worker(handle).await;
        }

        info!(database = %shared.database, joined = join_worker, "Stopped replication applier");
    }

    /// Stop the worker for good, clearing any recorded error.
    ///
    /// Always returns after the worker has exited, including a worker left
    /// behind by a non-joining `stop` or one that exited on its own.
    pub async fn shutdown(&self) {
        let shared = &self.shared;
        let handle = {
            let mut status = shared.status.write().await;
            status.state.clear_error();
            status.state.stop_initial_synchronization = true;

            if status.state.active {
                status.state.active = false;
                status.state.set_progress("applier stopped");
                metrics::set_applier_active(&shared.database, false);
            }

            let handle = status.worker.take();
            if handle.is_some() {
                shared.termination.send_replace(true);
            }
            handle
        };

        match handle {
            Some(handle) => shared.join_worker(handle).await,
            None => shared.await_teardown().await,
        }

        info!(database = %shared.database, "Shut down replication applier");
    }

    /// Replace the configuration and persist it durably.
    ///
    /// Coordinators must not call this; the role check is the caller's.
    pub async fn reconfigure(&self, configuration: ApplierConfiguration) -> Result<()> {
        if configuration.endpoint.is_empty() {
            return Err(ApplierError::InvalidConfiguration(
                "no endpoint configured".to_string(),
            ));
        }

        let mut status = self.shared.status.write().await;
        if status.state.active {
            return Err(ApplierError::AlreadyRunning);
        }

        info!(
            database = %self.shared.database,
            endpoint = %configuration.endpoint,
            "Reconfiguring replication applier"
        );
        status.configuration = configuration;
        self.shared.save_configuration_locked(status, true).await
    }

    /// Reset the state to defaults and delete its persisted record.
    ///
    /// Removing an absent record is not an error.
    pub async fn remove_state(&self) -> Result<()> {
        let shared = &self.shared;
        let mut status = shared.status.write().await;
        status.state.reset();
        let ticket = shared.state_slot.ticket();
        drop(status);

        let removed = shared
            .state_slot
            .run(ticket, shared.store.remove_state(&shared.database))
            .await?;
        trace!(
            database = %shared.database,
            removed = removed.unwrap_or(false),
            "Removed replication applier state"
        );
        Ok(())
    }

    /// Write the current state to the status store.
    pub async fn persist_state(&self, sync: bool) -> Result<()> {
        let status = self.shared.status.write().await;
        self.shared.persist_locked(status, sync).await
    }

    /// Status report composed from copies taken under a brief read lock.
    pub async fn status_report(&self) -> ApplierStatusReport {
        let (configuration, state) = {
            let status = self.shared.status.read().await;
            (status.configuration.clone(), status.state.clone())
        };
        ApplierStatusReport::compose(&configuration, &state, &self.shared.server)
    }

    /// Record an error. Every code except `REPLICATION_APPLIER_STOPPED` is
    /// logged.
    pub async fn set_error(&self, code: ErrorCode, message: impl Into<String>) {
        self.shared.set_error(code, message.into()).await;
    }

    pub async fn set_progress(&self, message: impl Into<String>) {
        self.shared.set_progress(message.into()).await;
    }

    /// Sleep for `duration` in chunks of [`WAIT_CHUNK`], returning `false`
    /// as soon as termination is observed.
    pub async fn wait(&self, duration: Duration) -> bool {
        self.shared.wait(duration).await
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.is_terminated()
    }
}

impl std::fmt::Debug for ReplicationApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationApplier")
            .field("database", &self.shared.database)
            .field("terminated", &self.shared.is_terminated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStatusStore;
    use crate::syncer::NoOpSyncer;

    async fn applier(config: Option<ApplierConfiguration>) -> ReplicationApplier {
        let store: Arc<dyn StatusStore> = Arc::new(SqliteStatusStore::new(":memory:").await.unwrap());
        if let Some(config) = config {
            store.save_configuration("_system", &config, false).await.unwrap();
        }
        ReplicationApplier::open(
            "_system",
            store,
            Arc::new(NoOpSyncer::factory()),
            ServerInfo::new("SNGL-1"),
        )
        .await
        .unwrap()
    }

    fn configured() -> Option<ApplierConfiguration> {
        Some(ApplierConfiguration::for_testing("tcp://leader:8529", "_system"))
    }

    #[tokio::test]
    async fn test_open_sets_initial_progress() {
        let applier = applier(None).await;
        let state = applier.state().await;
        assert_eq!(state.progress_message, "applier initially created for _system");
        assert!(!state.active);
        assert!(!applier.is_terminated());
    }

    #[tokio::test]
    async fn test_prevent_and_allow_start() {
        let applier = applier(configured()).await;

        applier.prevent_start().await.unwrap();
        assert!(matches!(applier.prevent_start().await, Err(ApplierError::AlreadyLocked)));
        assert!(matches!(applier.start(0, false, 0).await, Err(ApplierError::Blocked)));

        applier.allow_start().await.unwrap();
        assert!(matches!(applier.allow_start().await, Err(ApplierError::Internal(_))));

        applier.start(0, false, 0).await.unwrap();
        assert!(matches!(applier.prevent_start().await, Err(ApplierError::AlreadyRunning)));
        applier.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_without_endpoint_records_error() {
        let applier = applier(None).await;
        let result = applier.start(0, false, 0).await;
        assert!(matches!(result, Err(ApplierError::InvalidConfiguration(_))));

        let state = applier.state().await;
        assert!(!state.active);
        let err = state.last_error.unwrap();
        assert_eq!(err.code, ErrorCode::REPLICATION_INVALID_APPLIER_CONFIGURATION);
        assert_eq!(err.message, "no endpoint configured");
    }

    #[tokio::test]
    async fn test_stop_then_start_again() {
        let applier = applier(configured()).await;

        applier.start(0, false, 0).await.unwrap();
        assert!(applier.is_running().await);

        applier.stop(true, true).await;
        assert!(!applier.is_running().await);
        assert!(!applier.is_terminated());
        assert!(applier.stop_initial_synchronization().await);
        assert_eq!(applier.state().await.progress_message, "applier shut down");

        applier.start(0, false, 0).await.unwrap();
        assert!(applier.is_running().await);
        applier.shutdown().await;
        assert_eq!(applier.state().await.progress_message, "applier stopped");
    }

    #[tokio::test]
    async fn test_non_joining_stop_keeps_signal_until_shutdown() {
        let applier = applier(configured()).await;

        applier.start(0, false, 0).await.unwrap();
        applier.stop(false, false).await;
        assert!(applier.is_terminated());

        applier.shutdown().await;
        assert!(!applier.is_terminated());
    }

    #[tokio::test]
    async fn test_reconfigure_rules() {
        let applier = applier(configured()).await;

        let result = applier.reconfigure(ApplierConfiguration::default()).await;
        assert!(matches!(result, Err(ApplierError::InvalidConfiguration(_))));

        applier.start(0, false, 0).await.unwrap();
        let result = applier
            .reconfigure(ApplierConfiguration::for_testing("tcp://other:8529", "_system"))
            .await;
        assert!(matches!(result, Err(ApplierError::AlreadyRunning)));
        applier.shutdown().await;

        applier
            .reconfigure(ApplierConfiguration::for_testing("tcp://other:8529", "_system"))
            .await
            .unwrap();
        assert_eq!(applier.configuration().await.endpoint, "tcp://other:8529");
    }

    #[tokio::test]
    async fn test_set_error_and_progress() {
        let applier = applier(None).await;
        applier.set_error(ErrorCode::REPLICATION_APPLIER_STOPPED, "").await;
        applier.set_progress("fetching").await;

        let state = applier.state().await;
        assert_eq!(state.progress_message, "fetching");
        assert_eq!(state.last_error.unwrap().message, "replication stopped");
    }

    #[tokio::test]
    async fn test_wait_returns_false_when_already_terminated() {
        let applier = applier(configured()).await;
        applier.start(0, false, 0).await.unwrap();
        applier.stop(false, false).await;

        let started = Instant::now();
        assert!(!applier.wait(Duration::from_secs(5)).await);
        assert!(started.elapsed() < Duration::from_millis(100));
        applier.shutdown().await;
    }

    #[tokio::test]
    async fn test_wait_zero_duration() {
        let applier = applier(None).await;
        assert!(applier.wait(Duration::ZERO).await);
    }

    #[tokio::test]
    async fn test_abandoned_stop_still_lowers_signal() {
        let applier = applier(configured()).await;
        applier.start(0, false, 0).await.unwrap();

        // NoOpSyncer notices the stop only at its next 500ms chunk
        let abandoned = tokio::time::timeout(Duration::from_millis(20), applier.stop(true, true)).await;
        assert!(abandoned.is_err());
        assert!(applier.is_terminated());

        tokio::time::timeout(Duration::from_secs(3), applier.start(0, false, 0))
            .await
            .expect("start waited on a teardown nobody finishes")
            .unwrap();
        assert!(applier.is_running().await);
        assert!(!applier.is_terminated());
        applier.shutdown().await;
    }

    #[tokio::test]
    async fn test_syncer_build_panic_is_recorded() {
        let store: Arc<dyn StatusStore> = Arc::new(SqliteStatusStore::new(":memory:").await.unwrap());
        let config = ApplierConfiguration::for_testing("tcp://leader:8529", "_system");
        store.save_configuration("_system", &config, false).await.unwrap();
        let factory = |_request: SyncerRequest| -> Box<dyn crate::syncer::Syncer> {
            panic!("no syncer today")
        };
        let applier = ReplicationApplier::open("_system", store, Arc::new(factory), ServerInfo::new("SNGL-1"))
            .await
            .unwrap();

        let result = applier.start(0, false, 0).await;
        assert!(matches!(result, Err(ApplierError::Internal(_))));

        let state = applier.state().await;
        assert!(!state.active);
        let err = state.last_error.unwrap();
        assert_eq!(err.code, ErrorCode::INTERNAL);
        assert_eq!(err.message, "caught exception while creating syncer: no syncer today");

        applier.stop(true, true).await;
        assert!(!applier.is_terminated());
    }

    #[tokio::test]
    async fn test_persist_slot_skips_superseded_write() {
        let slot = PersistSlot::new();
        let older = slot.ticket();
        let newer = slot.ticket();

        assert_eq!(slot.run(newer, async { Ok(2) }).await.unwrap(), Some(2));
        assert_eq!(slot.run(older, async { Ok(1) }).await.unwrap(), None);
    }
}
