//! Fuzz target for status record decoding.
//!
//! A corrupted state or configuration record must fail to decode, never
//! panic. Whatever decodes must survive the merge and report paths.

#![no_main]

use libfuzzer_sys::fuzz_target;
use replication_applier::{
    ApplierConfiguration, ApplierState, ApplierStatusReport, BatchProgress, ServerInfo,
};

fuzz_target!(|data: &[u8]| {
    let config = serde_json::from_slice::<ApplierConfiguration>(data).unwrap_or_default();
    let _ = config.idle_wait_bounds();
    let _ = config.request_timeout_duration();

    if let Ok(mut state) = serde_json::from_slice::<ApplierState>(data) {
        state.clear_runtime_flags();
        state.apply_batch(&BatchProgress {
            last_applied_tick: u64::MAX,
            requests: u64::MAX,
            ..Default::default()
        });
        let report = ApplierStatusReport::compose(&config, &state, &ServerInfo::new("FUZZ"));
        let _ = serde_json::to_vec(&report);
    }
});
