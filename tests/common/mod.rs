//! Shared helpers for integration tests.

use std::path::Path;
use std::sync::Arc;

use circuit_guard::config::BreakerConfig;
use circuit_guard::persistence::backend::KeySchema;
use circuit_guard::persistence::{FileBackend, KeyValueBackend, KeyValueStore, MemoryBackend};
use circuit_guard::resilience::{CircuitBreaker, ManualClock};
use thiserror::Error;

pub const TABLE: &str = "circuit_breaker_table";

/// Errors a guarded dependency can fail with.
#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum DependencyError {
    #[error("NetworkError")]
    Network,
    #[error("InvalidRequest: {0}")]
    InvalidRequest(String),
}

/// A breaker over a backend, driven by a manual clock.
pub struct Harness<B = MemoryBackend> {
    pub backend: B,
    pub store: Arc<KeyValueStore>,
    pub clock: Arc<ManualClock>,
    pub breaker: CircuitBreaker,
}

pub fn harness(expiration_secs: u64, start: i64) -> Harness {
    harness_on(MemoryBackend::new(), expiration_secs, start)
}

/// Like [`harness`], but over an existing backend, as a second worker
/// sharing the same table would be.
pub fn harness_on(backend: MemoryBackend, expiration_secs: u64, start: i64) -> Harness {
    backend.create_table(TABLE, KeySchema::new("id"));
    wire(backend, expiration_secs, start)
}

/// A worker process of its own over a shared state file.
#[allow(dead_code)]
pub async fn file_harness(
    path: &Path,
    expiration_secs: u64,
    start: i64,
) -> Harness<FileBackend> {
    let backend = FileBackend::new(path);
    backend.create_table(TABLE, KeySchema::new("id")).await.unwrap();
    wire(backend, expiration_secs, start)
}

fn wire<B>(backend: B, expiration_secs: u64, start: i64) -> Harness<B>
where
    B: KeyValueBackend + Clone + 'static,
{
    let store = Arc::new(
        KeyValueStore::builder()
            .with_table_name(TABLE)
            .with_backend(Arc::new(backend.clone()))
            .disabled(false)
            .build()
            .unwrap(),
    );
    let clock = Arc::new(ManualClock::new(start));
    let breaker = CircuitBreaker::new(store.clone(), BreakerConfig { expiration_secs })
        .with_clock(clock.clone());

    Harness {
        backend,
        store,
        clock,
        breaker,
    }
}
