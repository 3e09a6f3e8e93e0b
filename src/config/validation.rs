//! Configuration validation.
//!
//! Serde handles syntax; this checks values that parse but cannot work.
//! All errors are returned, not just the first.

use thiserror::Error;

use crate::config::schema::Settings;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Zero is reserved for records that never expire.
    #[error("breaker.expiration_secs must be greater than zero")]
    ZeroExpiration,

    #[error("store.table_name must not be empty")]
    EmptyTableName,

    #[error("store.{field} must not be empty")]
    EmptyAttribute { field: &'static str },

    #[error("store.{first} and store.{second} both use attribute '{name}'")]
    DuplicateAttribute {
        first: &'static str,
        second: &'static str,
        name: String,
    },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.breaker.expiration_secs == 0 {
        errors.push(ValidationError::ZeroExpiration);
    }

    let store = &config.store;
    if store.table_name.trim().is_empty() {
        errors.push(ValidationError::EmptyTableName);
    }

    let mut attrs = vec![
        ("key_attr", store.key_attr.as_str()),
        ("expiry_attr", store.expiry_attr.as_str()),
        ("status_attr", store.status_attr.as_str()),
        ("cause_attr", store.cause_attr.as_str()),
    ];
    for (field, name) in &attrs {
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyAttribute { field: *field });
        }
    }
    if !store.sort_key_attr.is_empty() {
        attrs.push(("sort_key_attr", store.sort_key_attr.as_str()));
    }

    for (i, (first, a)) in attrs.iter().enumerate() {
        for (second, b) in &attrs[i + 1..] {
            if !a.is_empty() && a == b {
                errors.push(ValidationError::DuplicateAttribute {
                    first: *first,
                    second: *second,
                    name: a.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
