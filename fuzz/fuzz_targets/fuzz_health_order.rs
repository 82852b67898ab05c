//! Fuzz target for failover ordering.
//!
//! This tests that `ordered_server_ids` never panics on an arbitrary
//! health table and always puts the leader first without duplicates.

#![no_main]

use libfuzzer_sys::fuzz_target;
use replication_applier::cluster::ordered_server_ids;
use std::collections::HashSet;

fuzz_target!(|data: (&str, &[u8])| {
    let (leader, health) = data;
    let health = serde_json::from_slice::<serde_json::Value>(health).ok();

    let ids = ordered_server_ids(leader, health.as_ref());
    assert_eq!(ids.first().map(String::as_str), Some(leader));

    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
});
