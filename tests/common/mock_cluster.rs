//! Scripted consensus store.
//!
//! Answers every read with a fixed result and records the requested paths,
//! so tests can assert how many reads were attempted.

use replication_applier::cluster::ConsensusFuture;
use replication_applier::{ConsensusStore, ReadResult};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct ScriptedConsensus {
    result: Mutex<ReadResult>,
    calls: AtomicUsize,
    paths: Mutex<Vec<Vec<String>>>,
}

impl ScriptedConsensus {
    pub fn new(result: ReadResult) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(result),
            calls: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
        })
    }

    /// A store whose leader is `leader` and whose health table is `health`.
    pub fn with_leader(leader: &str, health: Value) -> Arc<Self> {
        Self::new(ReadResult::ok(failover_body(leader, health)))
    }

    pub fn set_result(&self, result: ReadResult) {
        *self.result.lock().unwrap() = result;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested_paths(&self) -> Vec<Vec<String>> {
        self.paths.lock().unwrap().clone()
    }
}

impl ConsensusStore for ScriptedConsensus {
    fn read_transaction(&self, paths: Vec<String>, _timeout: Duration) -> ConsensusFuture<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().unwrap().push(paths);
        let result = self.result.lock().unwrap().clone();
        Box::pin(async move { result })
    }
}

/// Consensus document holding a leader and a health table under `/arango`.
pub fn failover_body(leader: &str, health: Value) -> Value {
    json!({
        "arango": {
            "Plan": { "AsyncReplication": { "Leader": leader } },
            "Supervision": { "Health": health }
        }
    })
}

/// Health table from `(server id, status)` pairs, in the given order.
pub fn health_table(entries: &[(&str, &str)]) -> Value {
    let mut table = serde_json::Map::new();
    for (id, status) in entries {
        table.insert((*id).to_string(), json!({ "Status": status }));
    }
    Value::Object(table)
}
