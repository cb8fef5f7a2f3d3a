//! Object storage for round inputs and outputs
//!
//! The driver only ever sees [`ObjectLocation`] handles. Reading and writing
//! the records behind them is the executor's job.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Opaque handle to a stored set of records
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectLocation(String);

impl ObjectLocation {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectLocation {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Line-record storage used by executors
///
/// Objects are write-once: a round never overwrites its input or another
/// round's output.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read all records at a location
    async fn get(&self, location: &ObjectLocation) -> Result<Arc<Vec<String>>, StoreError>;

    /// Store records at a new location
    async fn put(&self, location: &ObjectLocation, records: Vec<String>) -> Result<(), StoreError>;

    /// Delete a location
    async fn remove(&self, location: &ObjectLocation) -> Result<(), StoreError>;

    /// Check whether a location exists
    async fn exists(&self, location: &ObjectLocation) -> bool;
}

/// In-memory object store
///
/// Records are shared behind an `Arc` so readers never copy a round's output.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<ObjectLocation, Arc<Vec<String>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Arc<Vec<String>>, StoreError> {
        let objects = self.objects.read().await;
        objects
            .get(location)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(location.to_string()))
    }

    async fn put(&self, location: &ObjectLocation, records: Vec<String>) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;

        // write-once
        if objects.contains_key(location) {
            return Err(StoreError::AlreadyExists(location.to_string()));
        }
        objects.insert(location.clone(), Arc::new(records));
        Ok(())
    }

    async fn remove(&self, location: &ObjectLocation) -> Result<(), StoreError> {
        let mut objects = self.objects.write().await;
        objects
            .remove(location)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(location.to_string()))
    }

    async fn exists(&self, location: &ObjectLocation) -> bool {
        self.objects.read().await.contains_key(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get() {
        let store = MemoryStore::new();
        let location = ObjectLocation::new("graph/input");
        store
            .put(&location, vec!["1\t2".to_string(), "2\t1".to_string()])
            .await
            .unwrap();

        let records = store.get(&location).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(store.exists(&location).await);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_put_is_write_once() {
        let store = MemoryStore::new();
        let location = ObjectLocation::from("a");
        store.put(&location, vec![]).await.unwrap();
        let err = store.put(&location, vec![]).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_missing_location() {
        let store = MemoryStore::new();
        let location = ObjectLocation::from("missing");
        assert!(matches!(store.get(&location).await, Err(StoreError::NotFound(_))));
        assert!(store.remove(&location).await.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryStore::new();
        let location = ObjectLocation::from("tmp");
        store.put(&location, vec!["x".into()]).await.unwrap();
        store.remove(&location).await.unwrap();
        assert!(!store.exists(&location).await);
    }

    #[test]
    fn test_shared_records_are_not_copied() {
        let store = MemoryStore::new();
        let location = ObjectLocation::from("shared");
        tokio_test::block_on(async {
            store.put(&location, vec!["1\t".into()]).await.unwrap();
            let first = store.get(&location).await.unwrap();
            let second = store.get(&location).await.unwrap();
            assert!(Arc::ptr_eq(&first, &second));
        });
    }
}
