//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files, and
//! every section falls back to its defaults so a minimal file is enough.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a guarded worker process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Settings {
    /// Breaker behavior (expiration).
    pub breaker: BreakerConfig,

    /// Key-value store layout and location.
    pub store: StoreConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Breaker configuration. Applied once per store; later attempts to
/// reconfigure the same store are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Number of seconds an opened breaker stays open.
    pub expiration_secs: u64,
}

impl BreakerConfig {
    /// Default expiration: 5 minutes.
    pub const DEFAULT_EXPIRATION_SECS: u64 = 5 * 60;

    /// Set the time a record stays open (whole seconds; sub-second parts are dropped).
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration_secs = expiration.as_secs();
        self
    }

    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_secs)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            expiration_secs: Self::DEFAULT_EXPIRATION_SECS,
        }
    }
}

/// Layout of the key-value table holding breaker records.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Table name (mandatory).
    pub table_name: String,

    /// Attribute name of the partition key.
    pub key_attr: String,

    /// Attribute name of the sort key. Empty means the breaker id is the
    /// partition key itself.
    pub sort_key_attr: String,

    /// Fixed partition value used when a sort key is configured.
    /// Empty means `circuitBreaker#<function name>`.
    pub static_pk_value: String,

    /// Attribute name of the expiry timestamp.
    pub expiry_attr: String,

    /// Attribute name of the status.
    pub status_attr: String,

    /// Attribute name of the failure cause.
    pub cause_attr: String,

    /// State file shared by every process using this config. Empty keeps
    /// state in memory for the lifetime of the process.
    pub state_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: "circuit_breaker".to_string(),
            key_attr: "id".to_string(),
            sort_key_attr: String::new(),
            static_pk_value: String::new(),
            expiry_attr: "expiration".to_string(),
            status_attr: "status".to_string(),
            cause_attr: "cause".to_string(),
            state_file: "circuit-state.json".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
