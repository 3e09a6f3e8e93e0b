//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! CircuitBreaker
//!     → store.rs (PersistenceStore contract: configure / fetch_state / open)
//!     → keyvalue.rs (record ⇄ item mapping, conditional create)
//!     → backend/ (attribute-keyed storage: memory.rs in-process, file.rs shared
//!       between processes through a locked state file)
//! ```
//!
//! # Design Decisions
//! - Expiry is evaluated when a record is read; nothing deletes expired rows
//!   for correctness, though a backend may do so on its own
//! - The conditional create is the only concurrency control
//! - Store failures are surfaced, never interpreted as open or closed

pub mod backend;
pub mod keyvalue;
pub mod record;
pub mod store;

pub use backend::{FileBackend, KeyValueBackend, MemoryBackend};
pub use keyvalue::{KeyValueStore, KeyValueStoreBuilder};
pub use record::{Status, StatusRecord};
pub use store::{normalize_cause, ExpiryPolicy, PersistenceStore, StoreError, StoreResult};
