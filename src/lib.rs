//! Persisted fail-fast circuit breaker.
//!
//! A breaker's state lives in a shared key-value store, so independent
//! workers that share no memory still agree on whether a dependency is
//! currently failing. Opening is a conditional write; recovery happens when
//! the stored expiry passes.

pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod persistence;
pub mod resilience;
pub mod sample;

pub use config::{BreakerConfig, Settings};
pub use persistence::{
    FileBackend, KeyValueStore, MemoryBackend, PersistenceStore, Status, StatusRecord,
};
pub use resilience::{CircuitBreaker, Classifier, GuardError, Safeguarded};
