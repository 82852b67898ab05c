//! Status report types.
//!
//! [`ApplierStatusReport`] is what the REST layer returns for an applier
//! state query. It is composed from copies of the configuration and state
//! taken under the applier's read lock; composition itself runs unlocked.
//!
//! # Layout
//!
//! ```text
//! {
//!   "state": {
//!     "running": true,
//!     "lastAppliedContinuousTick": "1234",     // null while 0
//!     "lastProcessedContinuousTick": "1240",
//!     "lastAvailableContinuousTick": "1300",
//!     "safeResumeTick": "1200",
//!     "progress": { "time": "...", "message": "...", "failedConnects": 0 },
//!     "totalRequests": 12,
//!     "totalFailedConnects": 0,
//!     "totalEvents": 340,
//!     "totalOperationsExcluded": 3,
//!     "lastError": { "errorNum": 0 },
//!     "time": "2026-01-01T00:00:00Z"
//!   },
//!   "server": { "version": "0.1.0", "serverId": "PRMR-1234" },
//!   "endpoint": "tcp://leader:8529",
//!   "database": "_system"
//! }
//! ```

use crate::config::{ApplierConfiguration, ServerConfig};
use crate::state::ApplierState;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Static identity of the local server, added to every status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub server_id: String,
    pub version: String,
}

impl ServerInfo {
    /// Identity for `server_id`, reporting this crate's version.
    pub fn new(server_id: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn from_config(server: &ServerConfig) -> Self {
        Self::new(server.server_id.clone())
    }
}

/// Full status document of one applier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplierStatusReport {
    pub state: StateReport,
    pub server: ServerReport,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateReport {
    pub running: bool,
    pub last_applied_continuous_tick: Option<String>,
    pub last_processed_continuous_tick: Option<String>,
    pub last_available_continuous_tick: Option<String>,
    pub safe_resume_tick: Option<String>,
    pub progress: ProgressReport,
    pub total_requests: u64,
    pub total_failed_connects: u64,
    pub total_events: u64,
    pub total_operations_excluded: u64,
    pub last_error: LastErrorReport,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub message: String,
    pub failed_connects: u64,
}

/// `errorNum` is 0 when no error is recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastErrorReport {
    pub error_num: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerReport {
    pub version: String,
    pub server_id: String,
}

impl ApplierStatusReport {
    /// Compose a report from copies of the configuration and state.
    pub fn compose(
        configuration: &ApplierConfiguration,
        state: &ApplierState,
        server: &ServerInfo,
    ) -> Self {
        Self {
            state: StateReport::from_state(state),
            server: ServerReport {
                version: server.version.clone(),
                server_id: server.server_id.clone(),
            },
            endpoint: non_empty(&configuration.endpoint),
            database: non_empty(&configuration.database),
        }
    }
}

impl StateReport {
    fn from_state(state: &ApplierState) -> Self {
        let last_error = match &state.last_error {
            Some(err) => LastErrorReport {
                error_num: err.code.0,
                error_message: Some(err.message.clone()),
                time: Some(format_time(&err.time)),
            },
            None => LastErrorReport {
                error_num: 0,
                error_message: None,
                time: None,
            },
        };

        Self {
            running: state.active,
            last_applied_continuous_tick: tick(state.last_applied_continuous_tick),
            last_processed_continuous_tick: tick(state.last_processed_continuous_tick),
            last_available_continuous_tick: tick(state.last_available_continuous_tick),
            safe_resume_tick: tick(state.safe_resume_tick),
            progress: ProgressReport {
                time: state.progress_time.as_ref().map(format_time),
                message: state.progress_message.clone(),
                failed_connects: state.total_failed_connects,
            },
            total_requests: state.total_requests,
            total_failed_connects: state.total_failed_connects,
            total_events: state.total_events,
            total_operations_excluded: state.skipped_operations,
            last_error,
            time: format_time(&Utc::now()),
        }
    }
}

// Ticks exceed the exact integer range of JSON numbers in some clients.
fn tick(value: u64) -> Option<String> {
    (value > 0).then(|| value.to_string())
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}
