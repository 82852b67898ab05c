// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Leader and endpoint discovery.
//!
//! Tells clients which servers to talk to:
//! - on a coordinator, every known coordinator
//! - on a failover-capable single server, the elected leader followed by
//!   every healthy follower
//!
//! ```text
//! GET /_api/cluster/endpoints
//!        │
//!        ▼
//! handle_endpoints_request ──► LeaderResolver ──► ConsensusStore (Leader + Health, one read)
//!                                    │
//!                                    └──────────► MembershipDirectory (id → endpoint)
//! ```
//!
//! The consensus store and membership directory are collaborators
//! supplied by the host; [`FailoverConsensus`] spreads reads over several
//! consensus replicas and [`StaticDirectory`] is a fixed directory.

mod consensus;
mod handler;
mod leader;

pub use consensus::{ConsensusReplica, FailoverConsensus};
pub use handler::{handle_endpoints_request, EndpointEntry, EndpointsResponse};
pub use leader::{ordered_server_ids, LeaderResolver, HEALTH_PATH, HEALTH_STATUS_GOOD, LEADER_PATH};

use crate::error::ErrorCode;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Type alias for boxed consensus read futures.
pub type ConsensusFuture<'a> = Pin<Box<dyn Future<Output = ReadResult> + Send + 'a>>;

/// Outcome of one consensus read transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    pub success: bool,
    pub error_code: i32,
    pub error_message: String,
    /// The read documents as one nested object rooted at the top-level key.
    pub body: Value,
}

impl ReadResult {
    pub fn ok(body: Value) -> Self {
        Self {
            success: true,
            error_code: 0,
            error_message: String::new(),
            body,
        }
    }

    pub fn failed(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_code: code.0,
            error_message: message.into(),
            body: Value::Null,
        }
    }

    /// Value at a `/`-separated key path, e.g. `/arango/Supervision/Health`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(&self.body, |node, segment| node.get(segment))
    }
}

/// Client of the cluster's consensus store.
pub trait ConsensusStore: Send + Sync + 'static {
    /// Read all `paths` in one atomic transaction, giving up after `timeout`.
    fn read_transaction(&self, paths: Vec<String>, timeout: Duration) -> ConsensusFuture<'_>;
}

/// Maps server ids to endpoints and knows the current coordinators.
pub trait MembershipDirectory: Send + Sync + 'static {
    fn list_coordinators(&self) -> Vec<String>;

    /// Endpoint of a server, `None` if the id is unknown.
    fn endpoint_of(&self, server_id: &str) -> Option<String>;
}

/// A membership directory with a fixed set of servers.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    coordinators: Vec<String>,
    endpoints: HashMap<String, String>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server.
    pub fn with_server(mut self, server_id: &str, endpoint: &str) -> Self {
        self.endpoints
            .insert(server_id.to_string(), endpoint.to_string());
        self
    }

    /// Register a coordinator.
    pub fn with_coordinator(mut self, server_id: &str, endpoint: &str) -> Self {
        self.coordinators.push(server_id.to_string());
        self.with_server(server_id, endpoint)
    }
}

impl MembershipDirectory for StaticDirectory {
    fn list_coordinators(&self) -> Vec<String> {
        self.coordinators.clone()
    }

    fn endpoint_of(&self, server_id: &str) -> Option<String> {
        self.endpoints.get(server_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_result_get_walks_path() {
        let result = ReadResult::ok(json!({
            "arango": {
                "Plan": { "AsyncReplication": { "Leader": "SNGL-A" } }
            }
        }));

        assert_eq!(
            result.get("/arango/Plan/AsyncReplication/Leader"),
            Some(&json!("SNGL-A"))
        );
        assert!(result.get("/arango/Supervision/Health").is_none());
        assert!(result.get("/").is_some());
    }

    #[test]
    fn test_failed_read_result() {
        let result = ReadResult::failed(ErrorCode::CLUSTER_TIMEOUT, "timeout");
        assert!(!result.success);
        assert_eq!(result.error_code, 1457);
        assert!(result.get("/arango").is_none());
    }

    #[test]
    fn test_static_directory() {
        let directory = StaticDirectory::new()
            .with_coordinator("CRDN-1", "tcp://c1:8529")
            .with_server("PRMR-1", "tcp://p1:8529");

        assert_eq!(directory.list_coordinators(), vec!["CRDN-1".to_string()]);
        assert_eq!(directory.endpoint_of("PRMR-1").as_deref(), Some("tcp://p1:8529"));
        assert!(directory.endpoint_of("nope").is_none());
    }
}
