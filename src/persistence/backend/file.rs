//! JSON-file backend shared by independent processes.
//!
//! Every operation holds an advisory lock on `<state file>.lock` for its whole
//! duration: the state file is read, the operation is applied, and on writes
//! the new state replaces the file through a rename. Readers take a shared
//! lock, writers an exclusive one, so a conditional put in one process sees
//! every write committed by another.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs4::FileExt;

use super::memory::{MemoryBackend, Snapshot};
use super::{BackendError, Condition, Item, KeySchema, KeyValueBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

/// Backend persisted to a single JSON file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Use `path` as the state file. It is created on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Provision a table. Existing tables keep their schema and items.
    pub async fn create_table(
        &self,
        name: impl Into<String>,
        key_schema: KeySchema,
    ) -> Result<(), BackendError> {
        let name = name.into();
        self.locked(Access::Write, move |state| {
            state.create_table(name, key_schema);
            Ok(())
        })
        .await
    }

    /// Run `op` against the current file contents under the lock, off the
    /// async runtime since acquiring the lock blocks.
    async fn locked<T, F>(&self, access: Access, op: F) -> Result<T, BackendError>
    where
        T: Send + 'static,
        F: FnOnce(&MemoryBackend) -> Result<T, BackendError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || apply_locked(&path, access, op))
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?
    }
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(extension);
    PathBuf::from(name)
}

fn apply_locked<T>(
    path: &Path,
    access: Access,
    op: impl FnOnce(&MemoryBackend) -> Result<T, BackendError>,
) -> Result<T, BackendError> {
    let lock = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(sibling(path, ".lock"))?;
    match access {
        Access::Read => FileExt::lock_shared(&lock)?,
        Access::Write => FileExt::lock_exclusive(&lock)?,
    }

    // The lock is released when `lock` is dropped, on every return path.
    let state = read_state(path)?;
    let value = op(&state)?;
    if access == Access::Write {
        write_state(path, &state.to_snapshot())?;
    }
    Ok(value)
}

fn read_state(path: &Path) -> Result<MemoryBackend, BackendError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(MemoryBackend::new()),
        Err(e) => return Err(e.into()),
    };
    let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))?;
    MemoryBackend::from_snapshot(snapshot)
}

fn write_state(path: &Path, snapshot: &Snapshot) -> Result<(), BackendError> {
    let staging = sibling(path, ".tmp");
    let mut writer = BufWriter::new(File::create(&staging)?);
    serde_json::to_writer_pretty(&mut writer, snapshot)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    fs::rename(&staging, path)?;
    tracing::debug!(path = %path.display(), "Saved key-value state");
    Ok(())
}

#[async_trait]
impl KeyValueBackend for FileBackend {
    async fn get_item(
        &self,
        table: &str,
        key: &Item,
        _consistent_read: bool,
    ) -> Result<Option<Item>, BackendError> {
        let (table, key) = (table.to_string(), key.clone());
        self.locked(Access::Read, move |state| state.get(&table, &key))
            .await
    }

    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<&Condition>,
    ) -> Result<(), BackendError> {
        let (table, condition) = (table.to_string(), condition.cloned());
        self.locked(Access::Write, move |state| {
            state.put(&table, item, condition.as_ref())
        })
        .await
    }

    async fn update_item(
        &self,
        table: &str,
        key: &Item,
        set: Item,
        remove: &[String],
    ) -> Result<(), BackendError> {
        let (table, key, remove) = (table.to_string(), key.clone(), remove.to_vec());
        self.locked(Access::Write, move |state| {
            state.update(&table, &key, set, &remove)
        })
        .await
    }

    async fn delete_item(&self, table: &str, key: &Item) -> Result<(), BackendError> {
        let (table, key) = (table.to_string(), key.clone());
        self.locked(Access::Write, move |state| state.delete(&table, &key))
            .await
    }

    async fn scan(&self, table: &str) -> Result<Vec<Item>, BackendError> {
        let table = table.to_string();
        self.locked(Access::Read, move |state| state.scan_table(&table))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::backend::AttributeValue;

    const TABLE: &str = "circuit_breaker_table";

    fn item(id: &str, expiry: i64) -> Item {
        Item::from([
            ("id".to_string(), AttributeValue::S(id.into())),
            ("expiration".to_string(), AttributeValue::N(expiry)),
        ])
    }

    fn key(id: &str) -> Item {
        Item::from([("id".to_string(), AttributeValue::S(id.into()))])
    }

    fn open_condition(now: i64) -> Condition {
        Condition::attribute_not_exists("id")
            .or(Condition::less_than("expiration", AttributeValue::N(now)))
    }

    async fn backend(dir: &tempfile::TempDir) -> FileBackend {
        let backend = FileBackend::new(dir.path().join("state.json"));
        backend.create_table(TABLE, KeySchema::new("id")).await.unwrap();
        backend
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(&dir).await;
        assert_eq!(backend.get_item(TABLE, &key("a"), true).await.unwrap(), None);
        assert!(backend.scan(TABLE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_writes_are_visible_to_other_handles() {
        let dir = tempfile::tempdir().unwrap();
        let first = backend(&dir).await;
        let second = FileBackend::new(first.path());

        first.put_item(TABLE, item("a", 200), None).await.unwrap();
        assert_eq!(
            second.get_item(TABLE, &key("a"), true).await.unwrap(),
            Some(item("a", 200))
        );

        second.delete_item(TABLE, &key("a")).await.unwrap();
        assert_eq!(first.get_item(TABLE, &key("a"), true).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_conditional_put_sees_other_handle() {
        let dir = tempfile::tempdir().unwrap();
        let first = backend(&dir).await;
        let second = FileBackend::new(first.path());

        first
            .put_item(TABLE, item("a", 200), Some(&open_condition(100)))
            .await
            .unwrap();
        let err = second
            .put_item(TABLE, item("a", 300), Some(&open_condition(150)))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::ConditionalCheckFailed(_)));

        // a rejected write leaves the file untouched
        let stored = first.get_item(TABLE, &key("a"), true).await.unwrap();
        assert_eq!(stored, Some(item("a", 200)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_conditional_puts_apply_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = backend(&dir).await.path().to_path_buf();

        let mut handles = Vec::new();
        for i in 0..8 {
            let backend = FileBackend::new(&path);
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
        assert_eq!(FileBackend::new(&path).scan(TABLE).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_table_keeps_items() {
        let dir = tempfile::tempdir().unwrap();
        let first = backend(&dir).await;
        first.put_item(TABLE, item("a", 200), None).await.unwrap();

        first.create_table(TABLE, KeySchema::new("id")).await.unwrap();
        assert_eq!(first.scan(TABLE).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();

        let backend = FileBackend::new(&path);
        assert!(matches!(
            backend.get_item(TABLE, &key("a"), true).await,
            Err(BackendError::Serialization(_))
        ));
    }
}
