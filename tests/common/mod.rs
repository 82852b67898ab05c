//! Shared test utilities for lifecycle, discovery and chaos tests.
//!
//! This module provides:
//! - A recording syncer factory with scripted syncer behaviour
//! - A scripted consensus store that counts reads
//! - Helpers to open appliers on temporary status stores

#![allow(dead_code)]

pub mod mock_cluster;
pub mod mock_syncer;

pub use mock_cluster::*;
pub use mock_syncer::*;

use replication_applier::{
    ApplierConfiguration, FileStatusStore, ReplicationApplier, ServerInfo, StatusStore,
    SyncerFactory,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const DATABASE: &str = "_system";
pub const LEADER_ENDPOINT: &str = "tcp://leader:8529";

/// Install a fmt subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn configured() -> ApplierConfiguration {
    ApplierConfiguration::for_testing(LEADER_ENDPOINT, DATABASE)
}

pub async fn file_store(dir: &Path) -> Arc<dyn StatusStore> {
    Arc::new(FileStatusStore::new(dir).await.unwrap())
}

/// Open the `_system` applier, optionally saving `config` first.
pub async fn open_applier(
    store: Arc<dyn StatusStore>,
    factory: Arc<dyn SyncerFactory>,
    config: Option<ApplierConfiguration>,
) -> ReplicationApplier {
    init_tracing();
    if let Some(config) = config {
        store.save_configuration(DATABASE, &config, false).await.unwrap();
    }
    ReplicationApplier::open(DATABASE, store, factory, ServerInfo::new("SNGL-TEST"))
        .await
        .unwrap()
}

/// Poll `check` every 10ms until it holds or `within` elapses.
pub async fn eventually<F, Fut>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
