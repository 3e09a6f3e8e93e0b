//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → Settings (validated, immutable)
//!     → BreakerConfig handed to the breaker, StoreConfig to the store builder
//! ```
//!
//! # Design Decisions
//! - Config is read once at process start; there is no hot reload because a
//!   store accepts its breaker configuration only once
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{BreakerConfig, ObservabilityConfig, Settings, StoreConfig};
pub use validation::ValidationError;
