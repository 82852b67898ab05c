//! Property-based tests using proptest.
//!
//! These tests verify invariants that should hold for all inputs,
//! helping catch edge cases that unit tests might miss.

use proptest::prelude::*;
use replication_applier::cluster::ordered_server_ids;
use replication_applier::{ApplierState, BatchProgress};
use serde_json::{json, Map, Value};
use std::collections::HashSet;

fn health_table(entries: &[(String, bool)]) -> Value {
    let mut table = Map::new();
    for (id, good) in entries {
        let status = if *good { "GOOD" } else { "FAILED" };
        table.insert(id.clone(), json!({ "Status": status }));
    }
    Value::Object(table)
}

fn health_entries() -> impl Strategy<Value = Vec<(String, bool)>> {
    prop::collection::vec(("[A-Z]{1,3}", any::<bool>()), 0..12)
}

// =============================================================================
// Failover Ordering Properties
// =============================================================================

proptest! {
    /// The leader always comes first
    #[test]
    fn leader_always_first(leader in "[A-Z]{1,3}", entries in health_entries()) {
        let ids = ordered_server_ids(&leader, Some(&health_table(&entries)));
        prop_assert_eq!(ids.first(), Some(&leader));
    }

    /// No server id appears twice
    #[test]
    fn no_duplicate_ids(leader in "[A-Z]{1,3}", entries in health_entries()) {
        let ids = ordered_server_ids(&leader, Some(&health_table(&entries)));
        let unique: HashSet<&String> = ids.iter().collect();
        prop_assert_eq!(unique.len(), ids.len());
    }

    /// Every follower listed is healthy, and every healthy server is listed
    #[test]
    fn followers_are_exactly_the_healthy_servers(
        leader in "[A-Z]{1,3}",
        entries in health_entries(),
    ) {
        let table = health_table(&entries);
        let ids = ordered_server_ids(&leader, Some(&table));

        let healthy: Vec<String> = table
            .as_object()
            .unwrap()
            .iter()
            .filter(|(id, record)| *id != &leader && record["Status"] == "GOOD")
            .map(|(id, _)| id.clone())
            .collect();

        // table order is preserved
        prop_assert_eq!(&ids[1..], healthy.as_slice());
    }

    /// A missing or malformed health table yields just the leader
    #[test]
    fn malformed_health_yields_leader_only(leader in "[A-Z]{1,3}", junk in any::<i64>()) {
        prop_assert_eq!(ordered_server_ids(&leader, None), vec![leader.clone()]);
        prop_assert_eq!(
            ordered_server_ids(&leader, Some(&json!(junk))),
            vec![leader.clone()]
        );
    }
}

// =============================================================================
// Tick Monotonicity Properties
// =============================================================================

fn batch() -> impl Strategy<Value = BatchProgress> {
    (
        0u64..10_000,
        0u64..10_000,
        0u64..10_000,
        0u64..10_000,
        0u64..100,
        0u64..1_000,
        0u64..10,
    )
        .prop_map(
            |(processed, applied, available, safe, requests, events, skipped)| BatchProgress {
                last_processed_tick: processed,
                last_applied_tick: applied,
                last_available_tick: available,
                safe_resume_tick: safe,
                requests,
                events,
                skipped,
            },
        )
}

proptest! {
    /// Ticks never move backwards, whatever order batches arrive in
    #[test]
    fn ticks_never_regress(batches in prop::collection::vec(batch(), 1..40)) {
        let mut state = ApplierState::default();
        for batch in &batches {
            let before = state.clone();
            state.apply_batch(batch);
            prop_assert!(state.last_applied_continuous_tick >= before.last_applied_continuous_tick);
            prop_assert!(state.last_processed_continuous_tick >= before.last_processed_continuous_tick);
            prop_assert!(state.last_available_continuous_tick >= before.last_available_continuous_tick);
            prop_assert!(state.safe_resume_tick >= before.safe_resume_tick);
        }

        let max_applied = batches.iter().map(|b| b.last_applied_tick).max().unwrap_or(0);
        prop_assert_eq!(state.resume_tick(), max_applied);
    }

    /// Counters are the sum of the batch counters
    #[test]
    fn counters_accumulate(batches in prop::collection::vec(batch(), 0..40)) {
        let mut state = ApplierState::default();
        for batch in &batches {
            state.apply_batch(batch);
        }
        prop_assert_eq!(state.total_requests, batches.iter().map(|b| b.requests).sum::<u64>());
        prop_assert_eq!(state.total_events, batches.iter().map(|b| b.events).sum::<u64>());
        prop_assert_eq!(state.skipped_operations, batches.iter().map(|b| b.skipped).sum::<u64>());
    }
}
