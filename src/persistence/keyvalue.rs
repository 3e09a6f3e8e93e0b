//! Breaker store on top of a [`KeyValueBackend`].
//!
//! # Record Layout
//! ```text
//! id          S   partition key (or sort key, see below)
//! status      S   "OPEN" | "CLOSED"
//! expiration  N   epoch seconds; may double as the backend's TTL attribute
//! cause       S   optional
//! ```
//!
//! With a sort key configured, every breaker shares one fixed partition value
//! (`circuitBreaker#<function name>` by default) and the breaker id goes into
//! the sort key, so many breakers can live in one table.
//!
//! # Concurrency
//! Opening uses a single conditional put:
//! `attribute_not_exists(id) OR expiration < :now`. A rejected condition
//! means another caller already holds a live OPEN record; it is logged and
//! treated as success.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{BreakerConfig, ConfigError, StoreConfig};
use crate::persistence::backend::{
    AttributeValue, BackendError, Condition, Item, KeySchema, KeyValueBackend,
};
use crate::persistence::record::{Status, StatusRecord};
use crate::persistence::store::{ExpiryPolicy, PersistenceStore, StoreError, StoreResult};

/// Environment flag that turns the breaker into a pass-through.
pub const DISABLED_ENV: &str = "CIRCUIT_BREAKER_DISABLED";

/// Environment variable naming the running function, used in the default
/// partition value.
pub const FUNCTION_NAME_ENV: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// `true` unless the flag is unset or `false` (any case).
pub fn is_disabled_value(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.eq_ignore_ascii_case("false"))
}

/// Read the disable flag from the environment.
pub fn disabled_from_env() -> bool {
    is_disabled_value(std::env::var(DISABLED_ENV).ok().as_deref())
}

fn default_static_pk_value() -> String {
    format!(
        "circuitBreaker#{}",
        std::env::var(FUNCTION_NAME_ENV).unwrap_or_default()
    )
}

/// Key-value implementation of [`PersistenceStore`].
pub struct KeyValueStore {
    table_name: String,
    key_attr: String,
    static_pk_value: String,
    sort_key_attr: Option<String>,
    expiry_attr: String,
    status_attr: String,
    cause_attr: String,
    /// `None` when the breaker is disabled.
    backend: Option<Arc<dyn KeyValueBackend>>,
    expiry: ExpiryPolicy,
}

impl KeyValueStore {
    pub fn builder() -> KeyValueStoreBuilder {
        KeyValueStoreBuilder::default()
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Key schema the backing table must be provisioned with.
    pub fn key_schema(&self) -> KeySchema {
        let schema = KeySchema::new(&self.key_attr);
        match &self.sort_key_attr {
            Some(sort_key) => schema.with_sort_key(sort_key),
            None => schema,
        }
    }

    fn backend(&self) -> StoreResult<&dyn KeyValueBackend> {
        self.backend.as_deref().ok_or(StoreError::Disabled)
    }

    fn id_attr(&self) -> &str {
        self.sort_key_attr.as_deref().unwrap_or(&self.key_attr)
    }

    /// Key for a breaker id, depending on whether a sort key is configured.
    fn key(&self, id: &str) -> Item {
        let mut key = Item::new();
        match &self.sort_key_attr {
            Some(sort_key) => {
                key.insert(
                    self.key_attr.clone(),
                    AttributeValue::S(self.static_pk_value.clone()),
                );
                key.insert(sort_key.clone(), AttributeValue::S(id.to_string()));
            }
            None => {
                key.insert(self.key_attr.clone(), AttributeValue::S(id.to_string()));
            }
        }
        key
    }

    fn record_to_item(&self, record: &StatusRecord) -> Item {
        let mut item = self.key(&record.id);
        item.insert(self.expiry_attr.clone(), AttributeValue::N(record.expiry));
        item.insert(
            self.status_attr.clone(),
            AttributeValue::S(record.status.as_str().to_string()),
        );
        if let Some(cause) = &record.cause {
            item.insert(self.cause_attr.clone(), AttributeValue::S(cause.clone()));
        }
        item
    }

    /// Translate a raw item to a record. Items without an id are skipped.
    fn item_to_record(&self, item: &Item) -> StoreResult<Option<StatusRecord>> {
        let Some(id) = item.get(self.id_attr()).and_then(AttributeValue::as_s) else {
            return Ok(None);
        };
        let status = item
            .get(&self.status_attr)
            .and_then(AttributeValue::as_s)
            .ok_or_else(|| StoreError::MalformedRecord(format!("{}: missing status", id)))?
            .parse::<Status>()
            .map_err(|e| StoreError::MalformedRecord(format!("{}: {}", id, e)))?;
        let expiry = item
            .get(&self.expiry_attr)
            .and_then(AttributeValue::as_n)
            .ok_or_else(|| StoreError::MalformedRecord(format!("{}: missing expiry", id)))?;
        let cause = item
            .get(&self.cause_attr)
            .and_then(AttributeValue::as_s)
            .map(str::to_string);

        Ok(Some(StatusRecord {
            id: id.to_string(),
            status,
            expiry,
            cause,
        }))
    }

    /// Create a record unless a live one exists. A rejected write is not an error.
    pub async fn create_record(&self, record: &StatusRecord, now: i64) -> StoreResult<()> {
        let condition = Condition::attribute_not_exists(&self.key_attr).or(Condition::less_than(
            &self.expiry_attr,
            AttributeValue::N(now),
        ));

        tracing::debug!(breaker_id = %record.id, "Putting record for circuit breaker");
        match self
            .backend()?
            .put_item(&self.table_name, self.record_to_item(record), Some(&condition))
            .await
        {
            Ok(()) => Ok(()),
            Err(BackendError::ConditionalCheckFailed(_)) => {
                tracing::debug!(
                    breaker_id = %record.id,
                    "Record for open circuit breaker already exists, keeping it"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite a record in place regardless of its current state.
    pub async fn update_record(&self, record: &StatusRecord) -> StoreResult<()> {
        tracing::debug!(breaker_id = %record.id, "Updating record for circuit breaker");

        let mut set = Item::from([
            (self.expiry_attr.clone(), AttributeValue::N(record.expiry)),
            (
                self.status_attr.clone(),
                AttributeValue::S(record.status.as_str().to_string()),
            ),
        ]);
        let mut remove = Vec::new();
        match &record.cause {
            Some(cause) => {
                set.insert(self.cause_attr.clone(), AttributeValue::S(cause.clone()));
            }
            None => remove.push(self.cause_attr.clone()),
        }

        self.backend()?
            .update_item(&self.table_name, &self.key(&record.id), set, &remove)
            .await?;
        Ok(())
    }

    /// Strongly consistent point read of a breaker record.
    pub async fn fetch_record(&self, id: &str) -> StoreResult<Option<StatusRecord>> {
        let item = self
            .backend()?
            .get_item(&self.table_name, &self.key(id), true)
            .await?;
        match item {
            Some(item) => self.item_to_record(&item),
            None => Ok(None),
        }
    }

    /// Remove a record, closing the breaker immediately.
    pub async fn delete_record(&self, id: &str) -> StoreResult<()> {
        tracing::debug!(breaker_id = %id, "Deleting record for circuit breaker");
        self.backend()?
            .delete_item(&self.table_name, &self.key(id))
            .await?;
        Ok(())
    }

    /// All breaker records of this store, sorted by id.
    pub async fn list_records(&self) -> StoreResult<Vec<StatusRecord>> {
        let items = self.backend()?.scan(&self.table_name).await?;

        let mut records = Vec::with_capacity(items.len());
        for item in &items {
            // shared tables may hold rows of other partitions
            if self.sort_key_attr.is_some()
                && item.get(&self.key_attr).and_then(AttributeValue::as_s)
                    != Some(self.static_pk_value.as_str())
            {
                continue;
            }
            if let Some(record) = self.item_to_record(item)? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}

#[async_trait]
impl PersistenceStore for KeyValueStore {
    fn configure(&self, config: &BreakerConfig) {
        self.expiry.configure(config);
    }

    async fn fetch_state(&self, id: &str, now: i64) -> StoreResult<Status> {
        if self.is_disabled() {
            return Ok(Status::Closed);
        }
        let status = self
            .fetch_record(id)
            .await?
            .map_or(Status::Closed, |record| record.effective_status(now));
        tracing::debug!(breaker_id = %id, status = %status, "Fetched circuit breaker state");
        Ok(status)
    }

    async fn open(&self, id: &str, cause: Option<&str>, now: i64) -> StoreResult<()> {
        if self.is_disabled() {
            return Ok(());
        }
        tracing::debug!(breaker_id = %id, "Saving circuit breaker status as OPEN");
        let record = StatusRecord::open(id, self.expiry.expiry_for(now)?, cause.map(str::to_string));
        self.create_record(&record, now).await
    }

    fn is_disabled(&self) -> bool {
        self.backend.is_none()
    }
}

/// Builder for [`KeyValueStore`].
///
/// ```ignore
/// KeyValueStore::builder()
///     .with_table_name("circuit_breaker_store")
///     .with_backend(backend)
///     .build()?;
/// ```
pub struct KeyValueStoreBuilder {
    table_name: String,
    key_attr: String,
    static_pk_value: Option<String>,
    sort_key_attr: Option<String>,
    expiry_attr: String,
    status_attr: String,
    cause_attr: String,
    backend: Option<Arc<dyn KeyValueBackend>>,
    disabled: Option<bool>,
}

impl Default for KeyValueStoreBuilder {
    fn default() -> Self {
        Self {
            table_name: String::new(),
            key_attr: "id".to_string(),
            static_pk_value: None,
            sort_key_attr: None,
            expiry_attr: "expiration".to_string(),
            status_attr: "status".to_string(),
            cause_attr: "cause".to_string(),
            backend: None,
            disabled: None,
        }
    }
}

impl KeyValueStoreBuilder {
    /// Start from a [`StoreConfig`]; empty optional fields keep their defaults.
    pub fn from_config(config: &StoreConfig) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            table_name: config.table_name.clone(),
            key_attr: config.key_attr.clone(),
            static_pk_value: non_empty(&config.static_pk_value),
            sort_key_attr: non_empty(&config.sort_key_attr),
            expiry_attr: config.expiry_attr.clone(),
            status_attr: config.status_attr.clone(),
            cause_attr: config.cause_attr.clone(),
            ..Self::default()
        }
    }

    /// Name of the table holding breaker records (mandatory).
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Partition key attribute, by default `id`.
    pub fn with_key_attr(mut self, key_attr: impl Into<String>) -> Self {
        self.key_attr = key_attr.into();
        self
    }

    /// Fixed partition value, used only with a sort key.
    pub fn with_static_pk_value(mut self, value: impl Into<String>) -> Self {
        self.static_pk_value = Some(value.into());
        self
    }

    pub fn with_sort_key_attr(mut self, sort_key_attr: impl Into<String>) -> Self {
        self.sort_key_attr = Some(sort_key_attr.into());
        self
    }

    pub fn with_expiry_attr(mut self, expiry_attr: impl Into<String>) -> Self {
        self.expiry_attr = expiry_attr.into();
        self
    }

    pub fn with_status_attr(mut self, status_attr: impl Into<String>) -> Self {
        self.status_attr = status_attr.into();
        self
    }

    pub fn with_cause_attr(mut self, cause_attr: impl Into<String>) -> Self {
        self.cause_attr = cause_attr.into();
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn KeyValueBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Override the `CIRCUIT_BREAKER_DISABLED` environment flag.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    /// Build the store. The disable flag is read here, once; when set, the
    /// backend is dropped and the store never touches it.
    pub fn build(self) -> Result<KeyValueStore, ConfigError> {
        if self.table_name.trim().is_empty() {
            return Err(ConfigError::MissingTableName);
        }

        let disabled = self.disabled.unwrap_or_else(disabled_from_env);
        let backend = if disabled {
            tracing::info!(table = %self.table_name, "Circuit breaker disabled, store will not be used");
            None
        } else {
            Some(self.backend.ok_or(ConfigError::MissingBackend)?)
        };

        Ok(KeyValueStore {
            table_name: self.table_name,
            key_attr: self.key_attr,
            static_pk_value: self.static_pk_value.unwrap_or_else(default_static_pk_value),
            sort_key_attr: self.sort_key_attr,
            expiry_attr: self.expiry_attr,
            status_attr: self.status_attr,
            cause_attr: self.cause_attr,
            backend,
            expiry: ExpiryPolicy::new(),
        })
    }
}
