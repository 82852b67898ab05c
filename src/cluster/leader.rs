// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Leader resolution.
//!
//! # Failover Ordering
//!
//! Leader and health table are fetched in one read transaction so they
//! describe the same moment. The result starts with the leader, followed by
//! every other server whose health `Status` is `GOOD`, in the order the
//! table lists them:
//!
//! ```text
//! Leader: "L"
//! Health: { "L": GOOD, "A": GOOD, "B": BAD, "C": GOOD }
//!
//! → [L, A, C]
//! ```
//!
//! An empty leader means an election is in progress; the result is empty.

use super::{ConsensusStore, MembershipDirectory};
use crate::config::{ConsensusConfig, ServerConfig, ServerRole};
use crate::error::{ApplierError, Result};
use crate::metrics;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Key of the elected leader's server id, relative to the prefix.
pub const LEADER_PATH: &str = "Plan/AsyncReplication/Leader";

/// Key of the health table (server id → health record), relative to the prefix.
pub const HEALTH_PATH: &str = "Supervision/Health";

pub const HEALTH_STATUS_GOOD: &str = "GOOD";

/// Server ids in failover order: the leader, then every other healthy server.
pub fn ordered_server_ids(leader: &str, health: Option<&Value>) -> Vec<String> {
    let mut ids = vec![leader.to_string()];
    if let Some(table) = health.and_then(Value::as_object) {
        ids.extend(
            table
                .iter()
                .filter(|(id, _)| id.as_str() != leader)
                .filter(|(_, record)| {
                    record.get("Status").and_then(Value::as_str) == Some(HEALTH_STATUS_GOOD)
                })
                .map(|(id, _)| id.clone()),
        );
    }
    ids
}

/// Computes the endpoints clients should use to reach the authoritative
/// service.
pub struct LeaderResolver {
    server: ServerConfig,
    consensus: Option<Arc<dyn ConsensusStore>>,
    directory: Arc<dyn MembershipDirectory>,
    config: ConsensusConfig,
}

impl LeaderResolver {
    /// `consensus` is `None` when no consensus store is configured.
    pub fn new(
        server: ServerConfig,
        consensus: Option<Arc<dyn ConsensusStore>>,
        directory: Arc<dyn MembershipDirectory>,
        config: ConsensusConfig,
    ) -> Self {
        Self {
            server,
            consensus,
            directory,
            config,
        }
    }

    pub fn role(&self) -> ServerRole {
        self.server.role
    }

    /// Ordered endpoint list for the local server's role.
    pub async fn endpoints(&self) -> Result<Vec<String>> {
        let role = self.server.role;
        let ids = match role {
            ServerRole::Coordinator => Ok(self.directory.list_coordinators()),
            ServerRole::Single => self.failover_server_ids().await,
            _ => Err(ApplierError::Forbidden(
                "only coordinators can serve this request".to_string(),
            )),
        };

        match ids {
            Ok(ids) => {
                let endpoints = self.resolve(ids);
                metrics::record_endpoint_lookup(&role.to_string(), "success", endpoints.len());
                Ok(endpoints)
            }
            Err(e) => {
                let outcome = match e {
                    ApplierError::Forbidden(_) => "forbidden",
                    _ => "error",
                };
                metrics::record_endpoint_lookup(&role.to_string(), outcome, 0);
                Err(e)
            }
        }
    }

    async fn failover_server_ids(&self) -> Result<Vec<String>> {
        let consensus = match (&self.consensus, self.server.automatic_failover) {
            (Some(consensus), true) => consensus,
            _ => {
                return Err(ApplierError::Forbidden(
                    "automatic failover is not enabled".to_string(),
                ))
            }
        };

        let health_path = self.config.path(HEALTH_PATH);
        let leader_path = self.config.path(LEADER_PATH);
        let timeout = self.config.read_timeout_duration();

        let started = Instant::now();
        let result = consensus
            .read_transaction(vec![health_path.clone(), leader_path.clone()], timeout)
            .await;
        if !result.success {
            warn!(
                code = result.error_code,
                error = %result.error_message,
                "Failed to read leader from consensus store"
            );
            return Err(ApplierError::ConsensusUnavailable {
                code: result.error_code,
                message: result.error_message,
            });
        }
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Read leader and health");

        let leader = result
            .get(&leader_path)
            .and_then(Value::as_str)
            .unwrap_or_default();
        if leader.is_empty() {
            info!("Leadership challenge is ongoing");
            return Ok(Vec::new());
        }

        Ok(ordered_server_ids(leader, result.get(&health_path)))
    }

    /// Map ids to endpoints, skipping ids the directory does not know.
    fn resolve(&self, ids: Vec<String>) -> Vec<String> {
        ids.into_iter()
            .filter_map(|id| match self.directory.endpoint_of(&id) {
                Some(endpoint) => Some(endpoint),
                None => {
                    warn!(server_id = %id, "No endpoint known for server, skipping");
                    None
                }
            })
            .collect()
    }
}
