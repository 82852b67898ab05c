//! Configuration for the replication applier and endpoint discovery.
//!
//! All types deserialize from YAML/JSON with per-field defaults, so a
//! partial document is enough to describe a deployment.
//!
//! # Configuration Structure
//!
//! ```text
//! ReplicationConfig
//! ├── server: ServerConfig            # identity, role, failover flag
//! ├── consensus: ConsensusConfig      # replica endpoints, key prefix, read timeout
//! └── status_store: StatusStoreConfig # where applier state is persisted
//!
//! ApplierConfiguration                # one per database, persisted by the applier
//! ```
//!
//! # YAML Example
//!
//! ```yaml
//! server:
//!   server_id: "PRMR-1234"
//!   role: single
//!   automatic_failover: true
//!
//! consensus:
//!   endpoints: ["tcp://agent-1:8531", "tcp://agent-2:8531"]
//!   read_timeout: "1s"
//!
//! status_store:
//!   backend: file
//!   directory: "/var/lib/db/replication"
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════════════
// ApplierConfiguration: per-database applier settings
// ═══════════════════════════════════════════════════════════════════════════════

/// Which collections the syncer should restrict itself to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RestrictType {
    /// No restriction.
    #[default]
    None,
    /// Only replicate `restrict_collections`.
    Include,
    /// Replicate everything except `restrict_collections`.
    Exclude,
}

/// Configuration of one replication applier.
///
/// Immutable while the applier is active. The connection-tuning fields are
/// opaque to the controller and only passed through to the syncer.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplierConfiguration {
    /// Address of the remote peer. Empty means "unconfigured".
    #[serde(default)]
    pub endpoint: String,

    /// Name of the database on the remote peer.
    #[serde(default)]
    pub database: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Start the applier automatically when the database is opened.
    #[serde(default)]
    pub auto_start: bool,

    /// Request timeout as a duration string (e.g. "10m").
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,

    /// Connect timeout as a duration string (e.g. "10s").
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,

    /// Give up after this many consecutive failed connects (0 = never).
    #[serde(default = "default_max_connect_retries")]
    pub max_connect_retries: u64,

    /// Pause between connection retries.
    #[serde(default = "default_connection_retry_wait")]
    pub connection_retry_wait: String,

    /// Requested chunk size for log fetches in bytes (0 = peer default).
    #[serde(default)]
    pub chunk_size: u64,

    /// Number of apply errors to tolerate before stopping.
    #[serde(default)]
    pub ignore_errors: u64,

    #[serde(default = "default_true")]
    pub adaptive_polling: bool,

    /// Automatically run a full resync when the peer no longer has our tick.
    #[serde(default)]
    pub auto_resync: bool,

    #[serde(default = "default_true")]
    pub include_system: bool,

    /// Fail instead of skipping ahead if the start tick is gone on the peer.
    #[serde(default)]
    pub require_from_present: bool,

    #[serde(default)]
    pub verbose: bool,

    /// Minimum idle wait between polls of a caught-up peer.
    #[serde(default = "default_idle_min_wait_time")]
    pub idle_min_wait_time: String,

    /// Maximum idle wait between polls of a caught-up peer.
    #[serde(default = "default_idle_max_wait_time")]
    pub idle_max_wait_time: String,

    #[serde(default)]
    pub restrict_type: RestrictType,

    #[serde(default)]
    pub restrict_collections: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> String {
    "10m".to_string()
}

fn default_connect_timeout() -> String {
    "10s".to_string()
}

fn default_max_connect_retries() -> u64 {
    100
}

fn default_connection_retry_wait() -> String {
    "15s".to_string()
}

fn default_idle_min_wait_time() -> String {
    "1s".to_string()
}

fn default_idle_max_wait_time() -> String {
    "2500ms".to_string()
}

fn parse_duration_or(value: &str, fallback: Duration) -> Duration {
    humantime::parse_duration(value).unwrap_or(fallback)
}

impl Default for ApplierConfiguration {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            database: String::new(),
            username: None,
            password: None,
            auto_start: false,
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            max_connect_retries: default_max_connect_retries(),
            connection_retry_wait: default_connection_retry_wait(),
            chunk_size: 0,
            ignore_errors: 0,
            adaptive_polling: true,
            auto_resync: false,
            include_system: true,
            require_from_present: false,
            verbose: false,
            idle_min_wait_time: default_idle_min_wait_time(),
            idle_max_wait_time: default_idle_max_wait_time(),
            restrict_type: RestrictType::None,
            restrict_collections: Vec::new(),
        }
    }
}

impl std::fmt::Debug for ApplierConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplierConfiguration")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("auto_start", &self.auto_start)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_connect_retries", &self.max_connect_retries)
            .field("connection_retry_wait", &self.connection_retry_wait)
            .field("chunk_size", &self.chunk_size)
            .field("ignore_errors", &self.ignore_errors)
            .field("adaptive_polling", &self.adaptive_polling)
            .field("auto_resync", &self.auto_resync)
            .field("include_system", &self.include_system)
            .field("require_from_present", &self.require_from_present)
            .field("verbose", &self.verbose)
            .field("idle_min_wait_time", &self.idle_min_wait_time)
            .field("idle_max_wait_time", &self.idle_max_wait_time)
            .field("restrict_type", &self.restrict_type)
            .field("restrict_collections", &self.restrict_collections)
            .finish()
    }
}

impl ApplierConfiguration {
    /// Both endpoint and database are set.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty() && !self.database.is_empty()
    }

    pub fn request_timeout_duration(&self) -> Duration {
        parse_duration_or(&self.request_timeout, Duration::from_secs(600))
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        parse_duration_or(&self.connect_timeout, Duration::from_secs(10))
    }

    pub fn connection_retry_wait_duration(&self) -> Duration {
        parse_duration_or(&self.connection_retry_wait, Duration::from_secs(15))
    }

    /// Idle wait bounds as `(min, max)`; `max` is never below `min`.
    pub fn idle_wait_bounds(&self) -> (Duration, Duration) {
        let min = parse_duration_or(&self.idle_min_wait_time, Duration::from_secs(1));
        let max = parse_duration_or(&self.idle_max_wait_time, Duration::from_millis(2500));
        (min, max.max(min))
    }

    /// Create a configured applier config for testing.
    pub fn for_testing(endpoint: &str, database: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            database: database.to_string(),
            ..Default::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ServerConfig: identity and role of the local server
// ═══════════════════════════════════════════════════════════════════════════════

/// Role of the local server in the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerRole {
    /// Standalone or failover-capable single server.
    #[default]
    Single,
    Coordinator,
    DbServer,
    Agent,
    Undefined,
}

impl std::fmt::Display for ServerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerRole::Single => write!(f, "SINGLE"),
            ServerRole::Coordinator => write!(f, "COORDINATOR"),
            ServerRole::DbServer => write!(f, "PRIMARY"),
            ServerRole::Agent => write!(f, "AGENT"),
            ServerRole::Undefined => write!(f, "UNDEFINED"),
        }
    }
}

/// Local server identity and role, passed explicitly to the applier and
/// the leader resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Unique server identifier reported in status documents.
    pub server_id: String,

    #[serde(default)]
    pub role: ServerRole,

    /// Whether automatic failover between single servers is enabled.
    #[serde(default)]
    pub automatic_failover: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_id: "local.dev.server.default".to_string(),
            role: ServerRole::Single,
            automatic_failover: false,
        }
    }
}

impl ServerConfig {
    pub fn for_testing(server_id: &str, role: ServerRole) -> Self {
        Self {
            server_id: server_id.to_string(),
            role,
            automatic_failover: false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ConsensusConfig: where leader election results live
// ═══════════════════════════════════════════════════════════════════════════════

/// Consensus store client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Consensus replica endpoints. Empty means no consensus store.
    #[serde(default)]
    pub endpoints: Vec<String>,

    /// Root key prefix under which the database keeps its keys.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Client-side timeout for one read transaction, across all replicas.
    #[serde(default = "default_read_timeout")]
    pub read_timeout: String,
}

fn default_prefix() -> String {
    "arango".to_string()
}

fn default_read_timeout() -> String {
    "1s".to_string()
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            prefix: default_prefix(),
            read_timeout: default_read_timeout(),
        }
    }
}

impl ConsensusConfig {
    /// A consensus store is configured.
    pub fn enabled(&self) -> bool {
        !self.endpoints.is_empty()
    }

    pub fn read_timeout_duration(&self) -> Duration {
        parse_duration_or(&self.read_timeout, Duration::from_secs(1))
    }

    /// Absolute key path for a path relative to the prefix.
    ///
    /// `"Supervision/Health"` becomes `"/arango/Supervision/Health"`.
    pub fn path(&self, relative: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        let relative = relative.trim_matches('/');
        if prefix.is_empty() {
            format!("/{}", relative)
        } else {
            format!("/{}/{}", prefix, relative)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// StatusStoreConfig: where applier state is persisted
// ═══════════════════════════════════════════════════════════════════════════════

/// Backend used for persisted applier state and configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StatusStoreConfig {
    /// One JSON document per database below `directory`.
    File { directory: String },
    /// One SQLite database holding all records.
    Sqlite { path: String },
}

impl Default for StatusStoreConfig {
    fn default() -> Self {
        StatusStoreConfig::File {
            directory: "replication".to_string(),
        }
    }
}

impl StatusStoreConfig {
    /// In-memory SQLite for testing.
    pub fn in_memory() -> Self {
        StatusStoreConfig::Sqlite {
            path: ":memory:".to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Top-level config
// ═══════════════════════════════════════════════════════════════════════════════

/// Process-level replication settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReplicationConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub consensus: ConsensusConfig,

    #[serde(default)]
    pub status_store: StatusStoreConfig,
}

impl ReplicationConfig {
    /// Create a minimal config for testing.
    pub fn for_testing(server_id: &str) -> Self {
        Self {
            server: ServerConfig::for_testing(server_id, ServerRole::Single),
            consensus: ConsensusConfig::default(),
            status_store: StatusStoreConfig::in_memory(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
