//! # Replication Applier
//!
//! The replication control plane of a replicated document database: the
//! controller that starts, stops, persists and reports on the background
//! worker tailing a remote peer, plus the endpoint discovery used by
//! coordinators and failover-capable single servers.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                           replication-applier                             │
//! │                                                                           │
//! │  ┌────────────────────┐  spawn   ┌─────────────┐   run    ┌─────────────┐ │
//! │  │ ReplicationApplier │─────────►│ worker task │─────────►│ Syncer      │ │
//! │  │ (RwLock: config,   │◄─────────│ (catch_     │◄─────────│ (external)  │ │
//! │  │  state, handle)    │ errors   │  unwind)    │ handle   └─────────────┘ │
//! │  └────────────────────┘          └─────────────┘                          │
//! │            │                                                              │
//! │            ▼                                                              │
//! │  ┌────────────────────┐                                                   │
//! │  │ StatusStore        │  JSON files or SQLite, one record per database    │
//! │  └────────────────────┘                                                   │
//! │                                                                           │
//! │  ┌────────────────────┐  read txn  ┌──────────────────────────┐           │
//! │  │ LeaderResolver     │───────────►│ ConsensusStore (failover)│           │
//! │  │                    │───────────►│ MembershipDirectory      │           │
//! │  └────────────────────┘            └──────────────────────────┘           │
//! │            ▲                                                              │
//! │  GET /_api/cluster/endpoints (axum)                                       │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use replication_applier::store::open_status_store;
//! use replication_applier::syncer::NoOpSyncer;
//! use replication_applier::{
//!     ApplierConfiguration, ReplicationApplier, ReplicationConfig, ServerInfo,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> replication_applier::Result<()> {
//!     let config = ReplicationConfig::default();
//!     let store = open_status_store(&config.status_store).await?;
//!
//!     let applier = ReplicationApplier::open(
//!         "_system",
//!         store,
//!         Arc::new(NoOpSyncer::factory()),
//!         ServerInfo::from_config(&config.server),
//!     )
//!     .await?;
//!
//!     applier
//!         .reconfigure(ApplierConfiguration::for_testing("tcp://leader:8529", "_system"))
//!         .await?;
//!     applier.start(0, false, 0).await?;
//!
//!     // ...
//!     applier.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod applier;
pub mod cluster;
pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod state;
pub mod store;
pub mod syncer;

// Re-exports for convenience
pub use applier::{ApplierHandle, ApplierStatusReport, ReplicationApplier, ServerInfo};
pub use cluster::{
    ConsensusStore, FailoverConsensus, LeaderResolver, MembershipDirectory, ReadResult,
    StaticDirectory,
};
pub use config::{
    ApplierConfiguration, ConsensusConfig, ReplicationConfig, ServerConfig, ServerRole,
    StatusStoreConfig,
};
pub use error::{ApplierError, ErrorCode, Result};
pub use state::{ApplierState, BatchProgress, LastError};
pub use store::{FileStatusStore, SqliteStatusStore, StatusStore};
pub use syncer::{NoOpSyncer, Syncer, SyncerFactory, SyncerRequest};
