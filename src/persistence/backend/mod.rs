//! Generic attribute-keyed storage backend.
//!
//! Items are flat maps of attribute name to value. A table declares which
//! attributes form its key; every other attribute is free-form. The only
//! concurrency primitive is the conditional put: the condition is evaluated
//! against the currently stored item and the write happens atomically with
//! that check.

pub mod file;
pub mod memory;

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// A stored item: attribute name → value.
pub type Item = HashMap<String, AttributeValue>;

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String.
    S(String),
    /// Number.
    N(i64),
}

impl AttributeValue {
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            AttributeValue::N(_) => None,
        }
    }

    pub fn as_n(&self) -> Option<i64> {
        match self {
            AttributeValue::N(n) => Some(*n),
            AttributeValue::S(_) => None,
        }
    }

    /// Strict ordering within one type; values of different types never compare.
    fn less_than(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::N(a), AttributeValue::N(b)) => a < b,
            (AttributeValue::S(a), AttributeValue::S(b)) => a < b,
            _ => false,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::S(s) => write!(f, "\"{}\"", s),
            AttributeValue::N(n) => write!(f, "{}", n),
        }
    }
}

/// Key attributes of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    pub partition_key: String,
    pub sort_key: Option<String>,
}

impl KeySchema {
    pub fn new(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: None,
        }
    }

    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }
}

/// Precondition on the currently stored item of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// No item exists, or the item lacks this attribute.
    AttributeNotExists(String),
    /// The attribute exists and is strictly less than the value.
    LessThan(String, AttributeValue),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    pub fn attribute_not_exists(name: impl Into<String>) -> Self {
        Condition::AttributeNotExists(name.into())
    }

    pub fn less_than(name: impl Into<String>, value: AttributeValue) -> Self {
        Condition::LessThan(name.into(), value)
    }

    pub fn or(self, other: Condition) -> Self {
        Condition::Or(Box::new(self), Box::new(other))
    }

    /// Evaluate against the stored item (`None` when nothing is stored).
    pub fn evaluate(&self, item: Option<&Item>) -> bool {
        match self {
            Condition::AttributeNotExists(name) => {
                item.map_or(true, |item| !item.contains_key(name))
            }
            Condition::LessThan(name, value) => item
                .and_then(|item| item.get(name))
                .is_some_and(|stored| stored.less_than(value)),
            Condition::Or(a, b) => a.evaluate(item) || b.evaluate(item),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::AttributeNotExists(name) => write!(f, "attribute_not_exists({})", name),
            Condition::LessThan(name, value) => write!(f, "{} < {}", name, value),
            Condition::Or(a, b) => write!(f, "{} OR {}", a, b),
        }
    }
}

/// Errors raised by a backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The precondition of a conditional write did not hold. Nothing was written.
    #[error("Conditional check failed: {0}")]
    ConditionalCheckFailed(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Item is missing key attribute '{0}'")]
    MissingKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Operations a key-value backend provides to the store adapter.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// Point read by key. `consistent_read` asks for the strongest read the
    /// backend offers.
    async fn get_item(
        &self,
        table: &str,
        key: &Item,
        consistent_read: bool,
    ) -> Result<Option<Item>, BackendError>;

    /// Create or replace a whole item. With a condition, the write is applied
    /// only if it holds for the stored item, else fails with
    /// [`BackendError::ConditionalCheckFailed`].
    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<&Condition>,
    ) -> Result<(), BackendError>;

    /// Unconditionally set and remove attributes of an item, creating it if absent.
    async fn update_item(
        &self,
        table: &str,
        key: &Item,
        set: Item,
        remove: &[String],
    ) -> Result<(), BackendError>;

    async fn delete_item(&self, table: &str, key: &Item) -> Result<(), BackendError>;

    /// All items of a table, in no particular order.
    async fn scan(&self, table: &str) -> Result<Vec<Item>, BackendError>;
}
