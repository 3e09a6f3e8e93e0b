//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Guarded call:
//!     → circuit_breaker.rs (fetch state; fail fast when open)
//!     → operation runs
//!     → On failure: classifier.rs (does it qualify?)
//!     → store open (conditional create) → error.rs (typed outcome)
//! ```
//!
//! # Design Decisions
//! - The breaker keeps no state in memory; the store is the source of truth
//! - Interception is explicit: wrap an operation with safeguard.rs or call the breaker directly
//! - Configuration is passed in; global.rs is an opt-in shared instance

pub mod circuit_breaker;
pub mod classifier;
pub mod clock;
pub mod error;
pub mod global;
pub mod safeguard;

pub use circuit_breaker::CircuitBreaker;
pub use classifier::Classifier;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::GuardError;
pub use safeguard::Safeguarded;
