//! Category cache
//!
//! Remembers, per [`Category`], which endpoint most recently won a race.
//! Memory is authoritative; an optional [`Storage`] mirrors every change so
//! the next process can warm-start. Persistence problems are logged and
//! otherwise ignored.

use crate::http::EndpointPool;
use crate::protocol::{CacheEntry, Category, ClientEvent, Endpoint};
use crate::storage::Storage;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

const KEY_PREFIX: &str = "cache:";

/// Persistence key for a category
pub fn cache_key(category: Category) -> String {
    format!("{}{}", KEY_PREFIX, category)
}

/// Per-category record of the last winning endpoint
pub struct CategoryCache {
    entries: RwLock<HashMap<Category, CacheEntry>>,
    storage: Option<Arc<dyn Storage>>,
    /// Serializes memory update + persistence so the two never reorder
    write_lock: Mutex<()>,
    event_tx: broadcast::Sender<ClientEvent>,
}

impl CategoryCache {
    /// Create an empty cache
    pub fn new(
        storage: Option<Arc<dyn Storage>>,
        event_tx: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            storage,
            write_lock: Mutex::new(()),
            event_tx,
        }
    }

    /// Create a cache warm-started from storage.
    ///
    /// Each category key is read on its own. A key that fails to read, or
    /// names an endpoint outside `pool`, is treated as absent and deleted.
    /// So is any `cache:` key that no category maps to.
    pub async fn load(
        pool: &EndpointPool,
        storage: Option<Arc<dyn Storage>>,
        event_tx: broadcast::Sender<ClientEvent>,
    ) -> Self {
        let cache = Self::new(storage, event_tx);
        let Some(storage) = cache.storage.clone() else {
            return cache;
        };

        cache.sweep_orphans(&*storage).await;

        let mut restored = 0;
        for category in Category::ALL {
            let key = cache_key(category);
            let stored = match storage.load(&key).await {
                Ok(Some(stored)) => stored,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("Dropping unreadable cache entry {}: {}", key, e);
                    cache.delete_quietly(&key).await;
                    continue;
                }
            };

            let endpoint = Endpoint::new(&stored.value);
            if !pool.contains(&endpoint) {
                tracing::warn!(
                    "Ignoring stale cache entry {} -> {} (not in endpoint pool)",
                    key,
                    endpoint
                );
                cache.delete_quietly(&key).await;
                continue;
            }

            cache.entries.write().insert(
                category,
                CacheEntry {
                    category,
                    endpoint,
                    won_at: stored.updated_at,
                },
            );
            restored += 1;
        }

        if restored > 0 {
            tracing::info!("Restored {} cached endpoint(s) from storage", restored);
        }
        cache
    }

    /// Cached endpoint for a category
    pub fn get(&self, category: Category) -> Option<Endpoint> {
        self.entries
            .read()
            .get(&category)
            .map(|entry| entry.endpoint.clone())
    }

    /// Full cache entry for a category
    pub fn entry(&self, category: Category) -> Option<CacheEntry> {
        self.entries.read().get(&category).cloned()
    }

    /// Every category and its cached endpoint, if any
    pub fn snapshot(&self) -> BTreeMap<Category, Option<Endpoint>> {
        let entries = self.entries.read();
        Category::ALL
            .iter()
            .map(|category| {
                (
                    *category,
                    entries.get(category).map(|entry| entry.endpoint.clone()),
                )
            })
            .collect()
    }

    /// Record `endpoint` as the winner for `category`, overwriting any previous
    pub async fn set(&self, category: Category, endpoint: Endpoint) {
        let _write = self.write_lock.lock().await;

        self.entries
            .write()
            .insert(category, CacheEntry::new(category, endpoint.clone()));

        if let Some(storage) = &self.storage {
            let key = cache_key(category);
            if let Err(e) = storage.save(&key, endpoint.as_str()).await {
                tracing::warn!("Failed to persist {}: {}", key, e);
            }
        }

        let _ = self.event_tx.send(ClientEvent::CacheUpdated { category, endpoint });
    }

    /// Drop the cached endpoint for `category`
    pub async fn invalidate(&self, category: Category) {
        let _write = self.write_lock.lock().await;
        self.remove(category).await;
    }

    /// Drop the cached endpoint for `category` only while it is still
    /// `endpoint`. A newer winner stored in the meantime is kept.
    ///
    /// Returns whether an entry was removed.
    pub async fn invalidate_if(&self, category: Category, endpoint: &Endpoint) -> bool {
        let _write = self.write_lock.lock().await;
        if self.get(category).as_ref() != Some(endpoint) {
            tracing::debug!("Keeping {} cache entry, no longer {}", category, endpoint);
            return false;
        }
        self.remove(category).await;
        true
    }

    /// Drop every cached endpoint
    pub async fn invalidate_all(&self) {
        let _write = self.write_lock.lock().await;
        for category in Category::ALL {
            self.remove(category).await;
        }
    }

    /// Caller must hold `write_lock`
    async fn remove(&self, category: Category) {
        let removed = self.entries.write().remove(&category);

        if let Some(storage) = &self.storage {
            let key = cache_key(category);
            if let Err(e) = storage.delete(&key).await {
                tracing::warn!("Failed to delete {}: {}", key, e);
            }
        }

        if let Some(entry) = removed {
            tracing::debug!("Invalidated {} -> {}", category, entry.endpoint);
            let _ = self.event_tx.send(ClientEvent::CacheInvalidated { category });
        }
    }

    async fn sweep_orphans(&self, storage: &dyn Storage) {
        let keys = match storage.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("Failed to list stored keys: {}", e);
                return;
            }
        };

        let known: Vec<String> = Category::ALL.iter().map(|c| cache_key(*c)).collect();
        for key in keys {
            if key.starts_with(KEY_PREFIX) && !known.contains(&key) {
                tracing::warn!("Dropping orphaned cache entry {}", key);
                self.delete_quietly(&key).await;
            }
        }
    }

    async fn delete_quietly(&self, key: &str) {
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.delete(key).await {
                tracing::warn!("Failed to delete {}: {}", key, e);
            }
        }
    }
}
