//! In-process reference backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use super::{BackendError, Condition, Item, KeySchema, KeyValueBackend};

/// A thread-safe key-value backend.
///
/// Conditional puts take the shard lock of the target key, so the condition
/// check and the write are atomic with respect to every other writer of this
/// backend. Reads are always strongly consistent.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    tables: Arc<DashMap<String, KeySchema>>,
    /// (table, encoded key) -> item
    items: Arc<DashMap<(String, String), Item>>,
}

/// Serialized form of a backend: table name -> schema and items.
pub(super) type Snapshot = BTreeMap<String, TableSnapshot>;

#[derive(Serialize, Deserialize)]
pub(super) struct TableSnapshot {
    key_schema: KeySchema,
    items: Vec<Item>,
}

impl MemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn from_snapshot(snapshot: Snapshot) -> Result<Self, BackendError> {
        let backend = Self::new();
        for (table, TableSnapshot { key_schema, items }) in snapshot {
            for item in items {
                let key = encode_key(&key_schema, &item)?;
                backend.items.insert((table.clone(), key), item);
            }
            backend.tables.insert(table, key_schema);
        }
        Ok(backend)
    }

    pub(super) fn to_snapshot(&self) -> Snapshot {
        let mut snapshot: Snapshot = self
            .tables
            .iter()
            .map(|t| {
                (
                    t.key().clone(),
                    TableSnapshot {
                        key_schema: t.value().clone(),
                        items: Vec::new(),
                    },
                )
            })
            .collect();
        for entry in self.items.iter() {
            if let Some(table) = snapshot.get_mut(&entry.key().0) {
                table.items.push(entry.value().clone());
            }
        }
        snapshot
    }

    /// Provision a table. Existing tables keep their schema and items.
    pub fn create_table(&self, name: impl Into<String>, key_schema: KeySchema) {
        self.tables.entry(name.into()).or_insert(key_schema);
    }

    /// Number of items across all tables.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn locate(&self, table: &str, key: &Item) -> Result<(String, String), BackendError> {
        let schema = self
            .tables
            .get(table)
            .ok_or_else(|| BackendError::TableNotFound(table.to_string()))?;
        Ok((table.to_string(), encode_key(schema.value(), key)?))
    }

    pub(super) fn get(&self, table: &str, key: &Item) -> Result<Option<Item>, BackendError> {
        let location = self.locate(table, key)?;
        Ok(self.items.get(&location).map(|r| r.value().clone()))
    }

    pub(super) fn put(
        &self,
        table: &str,
        item: Item,
        condition: Option<&Condition>,
    ) -> Result<(), BackendError> {
        let location = self.locate(table, &item)?;

        // The entry guard holds the shard lock until the write is done.
        match self.items.entry(location) {
            Entry::Occupied(mut stored) => {
                if let Some(condition) = condition {
                    if !condition.evaluate(Some(stored.get())) {
                        return Err(BackendError::ConditionalCheckFailed(condition.to_string()));
                    }
                }
                stored.insert(item);
            }
            Entry::Vacant(slot) => {
                if let Some(condition) = condition {
                    if !condition.evaluate(None) {
                        return Err(BackendError::ConditionalCheckFailed(condition.to_string()));
                    }
                }
                slot.insert(item);
            }
        }
        Ok(())
    }

    pub(super) fn update(
        &self,
        table: &str,
        key: &Item,
        set: Item,
        remove: &[String],
    ) -> Result<(), BackendError> {
        let location = self.locate(table, key)?;
        let mut stored = self.items.entry(location).or_insert_with(|| key.clone());
        stored.extend(set);
        for attr in remove {
            stored.remove(attr);
        }
        Ok(())
    }

    pub(super) fn delete(&self, table: &str, key: &Item) -> Result<(), BackendError> {
        let location = self.locate(table, key)?;
        self.items.remove(&location);
        Ok(())
    }

    pub(super) fn scan_table(&self, table: &str) -> Result<Vec<Item>, BackendError> {
        if !self.tables.contains_key(table) {
            return Err(BackendError::TableNotFound(table.to_string()));
        }
        Ok(self
            .items
            .iter()
            .filter(|r| r.key().0 == table)
            .map(|r| r.value().clone())
            .collect())
    }
}

/// Encode the key attributes of an item into a map key.
fn encode_key(schema: &KeySchema, item: &Item) -> Result<String, BackendError> {
    let partition = item
        .get(&schema.partition_key)
        .ok_or_else(|| BackendError::MissingKey(schema.partition_key.clone()))?;
    let sort = match &schema.sort_key {
        Some(attr) => Some(
            item.get(attr)
                .ok_or_else(|| BackendError::MissingKey(attr.clone()))?,
        ),
        None => None,
    };
    Ok(serde_json::to_string(&(partition, sort))?)
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    async fn get_item(
        &self,
        table: &str,
        key: &Item,
        _consistent_read: bool,
    ) -> Result<Option<Item>, BackendError> {
        self.get(table, key)
    }

    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<&Condition>,
    ) -> Result<(), BackendError> {
        self.put(table, item, condition)
    }

    async fn update_item(
        &self,
        table: &str,
        key: &Item,
        set: Item,
        remove: &[String],
    ) -> Result<(), BackendError> {
        self.update(table, key, set, remove)
    }

    async fn delete_item(&self, table: &str, key: &Item) -> Result<(), BackendError> {
        self.delete(table, key)
    }

    async fn scan(&self, table: &str) -> Result<Vec<Item>, BackendError> {
        self.scan_table(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::backend::AttributeValue;

    const TABLE: &str = "circuit_breaker_table";

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.create_table(TABLE, KeySchema::new("id"));
        backend
    }

    fn key(id: &str) -> Item {
        Item::from([("id".to_string(), AttributeValue::S(id.into()))])
    }

    fn item(id: &str, expiry: i64) -> Item {
        let mut item = key(id);
        item.insert("expiration".into(), AttributeValue::N(expiry));
        item
    }

    fn open_condition(now: i64) -> Condition {
        Condition::attribute_not_exists("id")
            .or(Condition::less_than("expiration", AttributeValue::N(now)))
    }

    #[tokio::test]
    async fn test_conditional_put_rejects_live_item() {
        let backend = backend();
        backend.put_item(TABLE, item("a", 200), Some(&open_condition(100))).await.unwrap();

        let err = backend
            .put_item(TABLE, item("a", 300), Some(&open_condition(150)))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::ConditionalCheckFailed(_)));

        let stored = backend.get_item(TABLE, &key("a"), true).await.unwrap().unwrap();
        assert_eq!(stored["expiration"], AttributeValue::N(200));
    }

    #[tokio::test]
    async fn test_conditional_put_replaces_expired_item() {
        let backend = backend();
        backend.put_item(TABLE, item("a", 200), None).await.unwrap();
        backend.put_item(TABLE, item("a", 400), Some(&open_condition(201))).await.unwrap();

        let stored = backend.get_item(TABLE, &key("a"), true).await.unwrap().unwrap();
        assert_eq!(stored["expiration"], AttributeValue::N(400));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_conditional_puts_apply_once() {
        let backend = backend();
        let mut handles = Vec::new();
        for i in 0..16 {
            let backend = backend.clone();
            handles.push(tokio::spawn(async move {
                backend
                    .put_item(TABLE, item("a", 1_000 + i), Some(&open_condition(100)))
                    .await
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_update_sets_and_removes() {
        let backend = backend();
        let mut stored = item("a", 200);
        stored.insert("cause".into(), AttributeValue::S("boom".into()));
        backend.put_item(TABLE, stored, None).await.unwrap();

        backend
            .update_item(
                TABLE,
                &key("a"),
                Item::from([("expiration".to_string(), AttributeValue::N(900))]),
                &["cause".to_string()],
            )
            .await
            .unwrap();

        let stored = backend.get_item(TABLE, &key("a"), true).await.unwrap().unwrap();
        assert_eq!(stored["expiration"], AttributeValue::N(900));
        assert!(!stored.contains_key("cause"));
    }

    #[tokio::test]
    async fn test_unknown_table_and_missing_key() {
        let backend = backend();
        assert!(matches!(
            backend.get_item("other", &key("a"), true).await,
            Err(BackendError::TableNotFound(_))
        ));
        assert!(matches!(
            backend.put_item(TABLE, Item::new(), None).await,
            Err(BackendError::MissingKey(ref attr)) if attr == "id"
        ));
    }

    #[tokio::test]
    async fn test_snapshot_keeps_tables_and_items() {
        let backend = MemoryBackend::new();
        backend.create_table(TABLE, KeySchema::new("pk").with_sort_key("sk"));
        let mut stored = Item::from([
            ("pk".to_string(), AttributeValue::S("circuitBreaker#fn".into())),
            ("sk".to_string(), AttributeValue::S("svc".into())),
        ]);
        stored.insert("expiration".into(), AttributeValue::N(77));
        backend.put_item(TABLE, stored.clone(), None).await.unwrap();

        let json = serde_json::to_string(&backend.to_snapshot()).unwrap();
        let restored = MemoryBackend::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();
        let mut key = stored.clone();
        key.remove("expiration");
        assert_eq!(restored.get_item(TABLE, &key, true).await.unwrap(), Some(stored));
    }
}
