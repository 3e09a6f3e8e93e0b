//! Startup orchestration.
//!
//! Builds the subsystems in dependency order from validated settings:
//! disable flag → backend (state file) → table → store → breaker. Any error
//! is fatal. A disabled runtime never opens the state file.

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ConfigError, Settings};
use crate::persistence::backend::BackendError;
use crate::persistence::keyvalue::disabled_from_env;
use crate::persistence::{
    FileBackend, KeyValueStore, KeyValueStoreBuilder, MemoryBackend, PersistenceStore,
};
use crate::resilience::CircuitBreaker;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to open state file: {0}")]
    Backend(#[from] BackendError),
}

/// The wired-up breaker stack of one process.
pub struct Runtime {
    store: Arc<KeyValueStore>,
    breaker: CircuitBreaker,
}

impl Runtime {
    /// Start with the disable flag taken from `CIRCUIT_BREAKER_DISABLED`.
    pub async fn start(settings: &Settings) -> Result<Self, StartupError> {
        Self::start_with(settings, disabled_from_env()).await
    }

    /// Start with an explicit disable flag.
    pub async fn start_with(settings: &Settings, disabled: bool) -> Result<Self, StartupError> {
        let builder = KeyValueStoreBuilder::from_config(&settings.store).disabled(disabled);
        let state_file = settings.store.state_file.as_str();

        let store = if disabled {
            builder.build()?
        } else if state_file.is_empty() {
            let backend = MemoryBackend::new();
            let store = builder.with_backend(Arc::new(backend.clone())).build()?;
            backend.create_table(store.table_name(), store.key_schema());
            store
        } else {
            let backend = FileBackend::new(state_file);
            let store = builder.with_backend(Arc::new(backend.clone())).build()?;
            backend
                .create_table(store.table_name(), store.key_schema())
                .await?;
            store
        };
        let store = Arc::new(store);

        let breaker = CircuitBreaker::new(store.clone(), settings.breaker.clone());

        tracing::info!(
            table = %store.table_name(),
            state_file = %state_file,
            expiration_secs = settings.breaker.expiration_secs,
            disabled = store.is_disabled(),
            "Circuit breaker runtime started"
        );

        Ok(Self { store, breaker })
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn store(&self) -> &KeyValueStore {
        &self.store
    }
}
