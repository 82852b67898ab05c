//! Consensus store reads with failover across replicas.
//!
//! One read is bounded by a single overall timeout. Replicas are tried in
//! turn, starting with the one that answered last:
//!
//! ```text
//! replicas: [a, b, c], last good = b
//!
//! read ──► b fails ──► c fails ──► a ok     → last good = a
//! read ──► a times out                      → CLUSTER_TIMEOUT
//! read ──► a fails ──► b fails ──► c fails  → c's failure
//! ```

use super::{ConsensusFuture, ConsensusStore, ReadResult};
use crate::config::ConsensusConfig;
use crate::error::ErrorCode;
use crate::metrics;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// One consensus replica and the client talking to it.
#[derive(Clone)]
pub struct ConsensusReplica {
    pub endpoint: String,
    pub client: Arc<dyn ConsensusStore>,
}

/// Consensus client spreading reads over several replicas.
pub struct FailoverConsensus {
    replicas: Vec<ConsensusReplica>,
    last_good: AtomicUsize,
}

impl FailoverConsensus {
    pub fn new(replicas: Vec<ConsensusReplica>) -> Self {
        Self {
            replicas,
            last_good: AtomicUsize::new(0),
        }
    }

    /// One replica per configured endpoint, each built by `connect`.
    pub fn from_config<F>(config: &ConsensusConfig, connect: F) -> Self
    where
        F: Fn(&str) -> Arc<dyn ConsensusStore>,
    {
        let replicas = config
            .endpoints
            .iter()
            .map(|endpoint| ConsensusReplica {
                endpoint: endpoint.clone(),
                client: connect(endpoint),
            })
            .collect();
        Self::new(replicas)
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    async fn read_with_failover(&self, paths: Vec<String>, timeout: Duration) -> ReadResult {
        let count = self.replicas.len();
        if count == 0 {
            return ReadResult::failed(
                ErrorCode::CLUSTER_BACKEND_UNAVAILABLE,
                "no consensus endpoints configured",
            );
        }

        let deadline = Instant::now() + timeout;
        let first = self.last_good.load(Ordering::Relaxed) % count;
        let mut last_failure = None;

        for offset in 0..count {
            let index = (first + offset) % count;
            let replica = &self.replicas[index];
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let started = Instant::now();
            let read = replica.client.read_transaction(paths.clone(), remaining);
            match tokio::time::timeout(remaining, read).await {
                Ok(result) if result.success => {
                    metrics::record_consensus_read(&replica.endpoint, "success", started.elapsed());
                    self.last_good.store(index, Ordering::Relaxed);
                    debug!(endpoint = %replica.endpoint, "Consensus read succeeded");
                    return result;
                }
                Ok(result) => {
                    metrics::record_consensus_read(&replica.endpoint, "failure", started.elapsed());
                    warn!(
                        endpoint = %replica.endpoint,
                        code = result.error_code,
                        error = %result.error_message,
                        "Consensus read failed, trying next replica"
                    );
                    last_failure = Some(result);
                }
                Err(_) => {
                    metrics::record_consensus_read(&replica.endpoint, "timeout", started.elapsed());
                    last_failure = None;
                    break;
                }
            }
        }

        // a replica's own answer wins over the deadline, unless a later
        // attempt was cut off by it
        last_failure.unwrap_or_else(|| {
            warn!(?timeout, "Consensus read timed out");
            ReadResult::failed(
                ErrorCode::CLUSTER_TIMEOUT,
                format!("consensus read timed out after {:?}", timeout),
            )
        })
    }
}

impl ConsensusStore for FailoverConsensus {
    fn read_transaction(&self, paths: Vec<String>, timeout: Duration) -> ConsensusFuture<'_> {
        Box::pin(self.read_with_failover(paths, timeout))
    }
}
