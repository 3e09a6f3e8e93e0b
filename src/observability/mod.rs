//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! resilience / persistence
//!     → tracing events (breaker_id field on every breaker event)
//!     → logging.rs subscriber (env filter, text or JSON, stderr)
//! ```
//!
//! # Design Decisions
//! - Structured fields rather than formatted messages
//! - Trips are logged at info, store failures at warn, everything else at debug

pub mod logging;
