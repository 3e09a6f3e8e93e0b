//! Circuit breaker backed by a shared persistence store.
//!
//! # States
//! - Closed: no record, or an expired one; calls pass through
//! - Open: a live OPEN record exists; calls fail fast
//!
//! # State Transitions
//! ```text
//! Closed → Open: guarded call fails with a qualifying error (conditional create)
//! Open → Closed: the record's expiry passes (evaluated on the next read)
//! ```
//!
//! # Design Decisions
//! - State lives in the store, not in this process; any number of
//!   independent workers share one breaker by id
//! - A success never writes; closing is expiry-only (or an operator deleting the record)
//! - No half-open probing
//! - Two callers can both read Closed and both run the operation before
//!   either writes; fail-fast is best effort and no lock is taken to prevent it

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::config::BreakerConfig;
use crate::persistence::{normalize_cause, PersistenceStore, Status, StoreResult};
use crate::resilience::classifier::Classifier;
use crate::resilience::clock::{Clock, SystemClock};
use crate::resilience::error::GuardError;
use crate::resilience::safeguard::Safeguarded;

/// Guards operations by breaker id.
#[derive(Clone)]
pub struct CircuitBreaker {
    store: Arc<dyn PersistenceStore>,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    /// Create a breaker and configure its store. A store that was already
    /// configured keeps its first configuration.
    pub fn new(store: Arc<dyn PersistenceStore>, config: BreakerConfig) -> Self {
        store.configure(&config);
        Self {
            store,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn PersistenceStore> {
        &self.store
    }

    /// Current status of a breaker.
    pub async fn state(&self, id: &str) -> StoreResult<Status> {
        self.store.fetch_state(id, self.clock.now_epoch_secs()).await
    }

    /// Run `operation` under the breaker `id`.
    ///
    /// - Open breaker: the operation is not run, [`GuardError::Open`]
    /// - Success: the value is returned, nothing is written
    /// - Qualifying failure: the breaker is opened, [`GuardError::Tripped`]
    /// - Other failure: [`GuardError::Operation`] with the error unchanged
    /// - Store failure on read or write: [`GuardError::Store`]
    pub async fn call<T, E, F, Fut>(
        &self,
        id: &str,
        classifier: &Classifier<E>,
        operation: F,
    ) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        if self.store.is_disabled() {
            return operation().await.map_err(GuardError::Operation);
        }

        let status = self
            .store
            .fetch_state(id, self.clock.now_epoch_secs())
            .await
            .map_err(|source| {
                tracing::warn!(breaker_id = %id, error = %source, "Failed to fetch circuit breaker state");
                GuardError::Store {
                    id: id.to_string(),
                    source,
                }
            })?;

        if status == Status::Open {
            tracing::debug!(breaker_id = %id, "Circuit is open, skipping call");
            return Err(GuardError::Open { id: id.to_string() });
        }

        match operation().await {
            Ok(value) => Ok(value),
            Err(error) if classifier.matches(&error) => {
                let cause = normalize_cause(&error);
                if let Err(source) = self
                    .store
                    .open(id, Some(cause.as_str()), self.clock.now_epoch_secs())
                    .await
                {
                    tracing::warn!(
                        breaker_id = %id,
                        cause = %cause,
                        error = %source,
                        "Failed to open circuit breaker"
                    );
                    return Err(GuardError::Store {
                        id: id.to_string(),
                        source,
                    });
                }
                tracing::info!(breaker_id = %id, cause = %cause, "Circuit tripped");
                Err(GuardError::Tripped {
                    id: id.to_string(),
                    cause: error,
                })
            }
            Err(error) => Err(GuardError::Operation(error)),
        }
    }

    /// Bind an operation to a breaker id and classifier, producing a callable
    /// that is guarded on every call.
    pub fn wrap<E, F>(
        &self,
        id: impl Into<String>,
        classifier: Classifier<E>,
        operation: F,
    ) -> Safeguarded<E, F> {
        Safeguarded::new(self.clone(), id.into(), classifier, operation)
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("disabled", &self.store.is_disabled())
            .finish()
    }
}
