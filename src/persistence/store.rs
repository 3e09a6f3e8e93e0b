//! The persistence contract the breaker relies on, plus helpers shared by
//! store adapters.

use std::any::type_name;
use std::fmt;
use std::sync::OnceLock;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::BreakerConfig;
use crate::persistence::backend::BackendError;
use crate::persistence::record::Status;

/// Errors surfaced by a store. The breaker never maps these to open or closed.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `open` was called before `configure`.
    #[error("Persistence store is not configured, call configure() before first use")]
    NotConfigured,

    /// Operator access to a store built with the breaker disabled.
    #[error("Persistence store is disabled")]
    Disabled,

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Malformed record: {0}")]
    MalformedRecord(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Operations every breaker store provides.
///
/// `open` must be a conditional create-or-replace: it takes effect only when
/// no record exists for the id or the stored one is expired as of `now`.
/// When a live record exists the write is dropped and `open` still returns
/// `Ok`, so two callers tripping at once never overwrite each other's
/// expiry or cause.
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Apply the breaker configuration. Only the first call has an effect.
    fn configure(&self, config: &BreakerConfig);

    /// Current status of a breaker at `now` (epoch seconds), read with the
    /// strongest consistency the store offers.
    async fn fetch_state(&self, id: &str, now: i64) -> StoreResult<Status>;

    /// Record the breaker as open until `now + expiration`.
    async fn open(&self, id: &str, cause: Option<&str>, now: i64) -> StoreResult<()>;

    /// A disabled store never reads or writes, and the breaker passes every
    /// call straight through.
    fn is_disabled(&self) -> bool {
        false
    }
}

/// Once-only expiration setting, composed by store adapters.
#[derive(Debug, Default)]
pub struct ExpiryPolicy {
    expiration_secs: OnceLock<u64>,
}

impl ExpiryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the expiration. Returns `false` when a previous call already did.
    pub fn configure(&self, config: &BreakerConfig) -> bool {
        let applied = self.expiration_secs.set(config.expiration_secs).is_ok();
        if !applied {
            tracing::trace!("Store already configured, ignoring new configuration");
        }
        applied
    }

    pub fn expiration_secs(&self) -> Option<u64> {
        self.expiration_secs.get().copied()
    }

    /// Epoch second at which a breaker opened at `now` expires.
    pub fn expiry_for(&self, now: i64) -> StoreResult<i64> {
        let secs = self.expiration_secs().ok_or(StoreError::NotConfigured)?;
        Ok(now.saturating_add(i64::try_from(secs).unwrap_or(i64::MAX)))
    }
}

/// Diagnostic text for a failure: its message, or its type name when the
/// message is blank.
pub fn normalize_cause<E: fmt::Display>(error: &E) -> String {
    let message = error.to_string();
    if message.trim().is_empty() {
        type_name::<E>().to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_configuration_wins() {
        let policy = ExpiryPolicy::new();
        assert_eq!(policy.expiration_secs(), None);

        assert!(policy.configure(&BreakerConfig { expiration_secs: 60 }));
        assert!(!policy.configure(&BreakerConfig { expiration_secs: 600 }));
        assert_eq!(policy.expiration_secs(), Some(60));
        assert_eq!(policy.expiry_for(1_000).unwrap(), 1_060);
    }

    #[test]
    fn test_expiry_requires_configuration() {
        let policy = ExpiryPolicy::new();
        assert!(matches!(policy.expiry_for(0), Err(StoreError::NotConfigured)));
    }

    #[test]
    fn test_expiry_saturates() {
        let policy = ExpiryPolicy::new();
        policy.configure(&BreakerConfig { expiration_secs: u64::MAX });
        assert_eq!(policy.expiry_for(10).unwrap(), i64::MAX);
    }

    #[derive(Debug)]
    struct Silent;

    impl fmt::Display for Silent {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Ok(())
        }
    }

    #[test]
    fn test_normalize_cause() {
        assert_eq!(normalize_cause(&"connection reset"), "connection reset");
        assert!(normalize_cause(&Silent).ends_with("Silent"));
    }
}
