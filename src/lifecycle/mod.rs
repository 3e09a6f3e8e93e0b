//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Settings → disable flag → open state file → build store → configure breaker
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The breaker is configured exactly once, during startup

pub mod startup;

pub use startup::{Runtime, StartupError};
