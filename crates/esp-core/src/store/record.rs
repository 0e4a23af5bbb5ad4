//! Keyed record stores with filtered scan

use super::document::temp_path;
use crate::error::StorageError;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Key/value record persistence
#[async_trait]
pub trait RecordStore<T>: Send + Sync
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Insert or replace
    async fn put(&self, key: &str, record: &T) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Option<T>, StorageError>;

    /// Returns whether a record was removed
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// All records matching `filter`, unordered
    async fn list(&self, filter: &(dyn for<'r> Fn(&'r T) -> bool + Send + Sync)) -> Result<Vec<T>, StorageError>;
}

/// In-memory record store
#[derive(Debug)]
pub struct InMemoryRecordStore<T> {
    records: DashMap<String, T>,
}

impl<T> Default for InMemoryRecordStore<T> {
    fn default() -> Self {
        Self {
            records: DashMap::new(),
        }
    }
}

impl<T> InMemoryRecordStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl<T> RecordStore<T> for InMemoryRecordStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn put(&self, key: &str, record: &T) -> Result<(), StorageError> {
        self.records.insert(key.to_string(), record.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<T>, StorageError> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.records.remove(key).is_some())
    }

    async fn list(&self, filter: &(dyn for<'r> Fn(&'r T) -> bool + Send + Sync)) -> Result<Vec<T>, StorageError> {
        Ok(self
            .records
            .iter()
            .filter(|r| filter(r.value()))
            .map(|r| r.value().clone())
            .collect())
    }
}

/// One pretty-printed JSON file per key in a directory
#[derive(Debug)]
pub struct JsonFileRecordStore<T> {
    dir: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileRecordStore<T> {
    /// Open (creating if needed) a store directory
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::io(&dir, e))?;
        Ok(Self {
            dir,
            _marker: PhantomData,
        })
    }

    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidReference(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl<T> RecordStore<T> for JsonFileRecordStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    async fn put(&self, key: &str, record: &T) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let bytes = serde_json::to_vec_pretty(record).map_err(StorageError::serialization)?;
        let tmp = temp_path(&path);
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StorageError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::io(&path, e))
    }

    async fn get(&self, key: &str) -> Result<Option<T>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(StorageError::serialization),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    async fn list(&self, filter: &(dyn for<'r> Fn(&'r T) -> bool + Send + Sync)) -> Result<Vec<T>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?;
        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::io(&self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| StorageError::io(&path, e))?;
            let record: T = serde_json::from_slice(&bytes).map_err(StorageError::serialization)?;
            if filter(&record) {
                out.push(record);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        open: bool,
    }

    fn note(id: &str, open: bool) -> Note {
        Note {
            id: id.to_string(),
            open,
        }
    }

    async fn exercise(store: &dyn RecordStore<Note>) {
        store.put("a", &note("a", true)).await.unwrap();
        store.put("b", &note("b", false)).await.unwrap();
        store.put("a", &note("a", false)).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(note("a", false)));
        assert_eq!(store.get("missing").await.unwrap(), None);

        store.put("c", &note("c", true)).await.unwrap();
        let open = store.list(&|n: &Note| n.open).await.unwrap();
        assert_eq!(open, vec![note("c", true)]);

        assert!(store.delete("b").await.unwrap());
        assert!(!store.delete("b").await.unwrap());
        assert_eq!(store.list(&|_: &Note| true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn memory_store() {
        exercise(&InMemoryRecordStore::new()).await;
    }

    #[tokio::test]
    async fn json_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileRecordStore::open(dir.path().join("notes")).await.unwrap();
        exercise(&store).await;
        assert!(store.dir().join("a.json").exists());
    }

    #[tokio::test]
    async fn json_file_store_rejects_bad_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFileRecordStore<Note> = JsonFileRecordStore::open(dir.path()).await.unwrap();
        assert!(matches!(
            store.put("../x", &note("x", true)).await,
            Err(StorageError::InvalidReference(_))
        ));
    }
}
