//! Storage Module
//!
//! Durable key/value persistence used to warm-start the category cache.
//! Values are plain strings; each key is independent, so a damaged entry
//! never affects its neighbours.

#[cfg(feature = "storage")]
pub mod sqlite;

#[cfg(feature = "storage")]
pub use sqlite::SqliteStorage;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A stored value and when it was last written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Storage trait for persisting client state
///
/// Implementations map string keys to string values. Writes should be
/// durable by the time the returned future resolves.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Load a value by key
    async fn load(&self, key: &str) -> Result<Option<StoredValue>>;

    /// Insert or overwrite a value
    async fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value (no-op when absent)
    async fn delete(&self, key: &str) -> Result<()>;

    /// All stored keys
    async fn keys(&self) -> Result<Vec<String>>;

    /// Check if storage is healthy
    async fn health_check(&self) -> Result<()>;
}

/// In-memory storage for testing and ephemeral clients
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: parking_lot::RwLock<HashMap<String, StoredValue>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn load(&self, key: &str) -> Result<Option<StoredValue>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = MemoryStorage::new();

        // Save
        storage.save("cache:lyrics", "https://a.example.com").await.unwrap();

        // Load
        let loaded = storage.load("cache:lyrics").await.unwrap().unwrap();
        assert_eq!(loaded.value, "https://a.example.com");

        // Overwrite
        storage.save("cache:lyrics", "https://b.example.com").await.unwrap();
        let loaded = storage.load("cache:lyrics").await.unwrap().unwrap();
        assert_eq!(loaded.value, "https://b.example.com");
        assert_eq!(storage.len(), 1);

        // Delete
        storage.delete("cache:lyrics").await.unwrap();
        assert!(storage.load("cache:lyrics").await.unwrap().is_none());
        assert!(storage.is_empty());

        // Deleting again is a no-op
        storage.delete("cache:lyrics").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_storage_keys_sorted() {
        let storage = MemoryStorage::new();
        storage.save("cache:search", "x").await.unwrap();
        storage.save("cache:album", "y").await.unwrap();
        assert_eq!(
            storage.keys().await.unwrap(),
            vec!["cache:album".to_string(), "cache:search".to_string()]
        );
    }
}
