//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Applier lifecycle (active gauge, start outcomes, worker panics)
//! - Recorded applier errors by code
//! - Status record persistence and SQLite busy retries
//! - Consensus reads per replica
//! - Endpoint discovery
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `replication_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration, size)
//!
//! No recorder is installed here; the host process decides where metrics go.

use crate::error::ErrorCode;
use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Set whether a database's applier is running.
pub fn set_applier_active(database: &str, active: bool) {
    gauge!("replication_applier_active", "database" => database.to_string())
        .set(if active { 1.0 } else { 0.0 });
}

/// Record a start attempt (`started`, `blocked`, `invalid_configuration`, `failed`).
pub fn record_applier_start(database: &str, outcome: &'static str) {
    counter!("replication_applier_starts_total", "database" => database.to_string(), "outcome" => outcome)
        .increment(1);
}

/// Record an error stored in an applier's state.
pub fn record_applier_error(database: &str, code: ErrorCode) {
    counter!(
        "replication_applier_errors_total",
        "database" => database.to_string(),
        "code" => code.0.to_string()
    )
    .increment(1);
}

/// Record a panic caught at the worker boundary.
pub fn record_worker_panic(database: &str) {
    counter!("replication_applier_worker_panics_total", "database" => database.to_string()).increment(1);
}

/// Record a state record write.
pub fn record_status_persist(database: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "failure" };
    counter!("replication_status_persists_total", "database" => database.to_string(), "status" => status)
        .increment(1);
    histogram!("replication_status_persist_duration_seconds").record(duration.as_secs_f64());
}

/// Record status store SQLite retry (for SQLITE_BUSY/SQLITE_LOCKED).
pub fn record_status_store_retry(operation: &str) {
    counter!("replication_status_store_retries_total", "operation" => operation.to_string()).increment(1);
}

/// Record one consensus read attempt against a replica.
pub fn record_consensus_read(endpoint: &str, outcome: &'static str, duration: Duration) {
    counter!(
        "replication_consensus_reads_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("replication_consensus_read_duration_seconds", "endpoint" => endpoint.to_string())
        .record(duration.as_secs_f64());
}

/// Record an endpoint discovery request and the number of endpoints returned.
pub fn record_endpoint_lookup(role: &str, outcome: &'static str, endpoints: usize) {
    counter!("replication_endpoint_lookups_total", "role" => role.to_string(), "outcome" => outcome)
        .increment(1);
    histogram!("replication_endpoint_lookup_size").record(endpoints as f64);
}
