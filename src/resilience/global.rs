//! Optional process-wide breaker.
//!
//! Code that cannot thread a [`CircuitBreaker`] through its call graph can
//! install one here at startup. The first installation wins; later ones are
//! ignored.

use std::sync::OnceLock;

use crate::config::ConfigError;
use crate::resilience::circuit_breaker::CircuitBreaker;

static BREAKER: OnceLock<CircuitBreaker> = OnceLock::new();

/// Install the process-wide breaker. Returns `false` if one was already installed.
pub fn configure(breaker: CircuitBreaker) -> bool {
    let installed = BREAKER.set(breaker).is_ok();
    if !installed {
        tracing::debug!("Circuit breaker already configured, ignoring");
    }
    installed
}

/// The process-wide breaker.
pub fn get() -> Result<&'static CircuitBreaker, ConfigError> {
    BREAKER.get().ok_or(ConfigError::NotConfigured)
}
