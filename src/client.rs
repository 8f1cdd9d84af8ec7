//! Mirror Client - Main entry point
//!
//! The `MirrorClient` owns the endpoint pool, the category cache and the
//! shared HTTP connection pool, and exposes request, calibration and
//! inspection operations on top of them.

use crate::cache::CategoryCache;
use crate::calibrator::Calibrator;
use crate::config::ClientConfig;
use crate::coordinator::FailoverCoordinator;
use crate::error::Result;
use crate::http::{ConnectionPool, EndpointPool, TimedRequest};
use crate::protocol::{
    CacheEntry, Category, ClientEvent, Endpoint, EndpointStats, RequestOptions,
};
#[cfg(feature = "storage")]
use crate::storage::SqliteStorage;
use crate::storage::Storage;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Maximum number of events to buffer
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Adaptive multi-mirror client
pub struct MirrorClient {
    config: Arc<ClientConfig>,
    pool: Arc<EndpointPool>,
    connections: Arc<ConnectionPool>,
    cache: Arc<CategoryCache>,
    coordinator: FailoverCoordinator,
    calibrator: Calibrator,
    event_tx: broadcast::Sender<ClientEvent>,
}

impl MirrorClient {
    /// Create a new client with the given configuration.
    ///
    /// When `database_path` is set the cache is persisted to SQLite there; if
    /// the database cannot be opened or fails its integrity check, the client
    /// falls back to memory only.
    pub async fn new(config: ClientConfig) -> Result<Arc<Self>> {
        config.validate()?;

        #[cfg(feature = "storage")]
        let storage: Option<Arc<dyn Storage>> = if let Some(ref db_path) = config.database_path {
            let opened = match SqliteStorage::new(db_path).await {
                Ok(s) => s.health_check().await.map(|_| s),
                Err(e) => Err(e),
            };
            match opened {
                Ok(s) => Some(Arc::new(s)),
                Err(e) => {
                    tracing::warn!(
                        "Failed to initialize database storage: {}. Cached endpoints will not be persisted.",
                        e
                    );
                    None
                }
            }
        } else {
            None
        };
        #[cfg(not(feature = "storage"))]
        let storage: Option<Arc<dyn Storage>> = None;

        Self::build(config, storage).await
    }

    /// Create a client persisting through the given storage backend
    pub async fn with_storage(config: ClientConfig, storage: Arc<dyn Storage>) -> Result<Arc<Self>> {
        config.validate()?;
        Self::build(config, Some(storage)).await
    }

    async fn build(config: ClientConfig, storage: Option<Arc<dyn Storage>>) -> Result<Arc<Self>> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let config = Arc::new(config);
        let pool = Arc::new(EndpointPool::new(&config.endpoints)?);
        let connections = Arc::new(ConnectionPool::new(&config.http, &config.user_agent)?);
        let requester = TimedRequest::new(connections.clone(), config.response.clone());

        let cache = Arc::new(CategoryCache::load(&pool, storage, event_tx.clone()).await);

        let coordinator = FailoverCoordinator::new(
            &pool,
            cache.clone(),
            requester.clone(),
            config.clone(),
            event_tx.clone(),
        );
        let calibrator = Calibrator::new(
            pool.clone(),
            cache.clone(),
            requester,
            config.clone(),
            event_tx.clone(),
        );

        tracing::debug!("Mirror client ready with {} endpoints", pool.len());

        Ok(Arc::new(Self {
            config,
            pool,
            connections,
            cache,
            coordinator,
            calibrator,
            event_tx,
        }))
    }

    /// GET `path` from the fastest known endpoint for `category`
    pub async fn request(&self, path: &str, category: Category) -> Result<Value> {
        self.coordinator
            .request(path, category, &RequestOptions::default())
            .await
    }

    /// [`request`](Self::request) with per-call timeouts or cancellation
    pub async fn request_with(
        &self,
        path: &str,
        category: Category,
        options: RequestOptions,
    ) -> Result<Value> {
        self.coordinator.request(path, category, &options).await
    }

    /// [`request`](Self::request) and deserialize the body
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        category: Category,
    ) -> Result<T> {
        let body = self.request(path, category).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Re-race all endpoints for `category`, ignoring the cache
    pub async fn refresh(&self, category: Category) -> Result<Option<Endpoint>> {
        self.calibrator.refresh(category).await
    }

    /// Re-race every category sequentially
    pub async fn refresh_all(&self) -> Result<BTreeMap<Category, Option<Endpoint>>> {
        self.calibrator.refresh_all().await
    }

    /// Forget the cached endpoint for `category`
    pub async fn reset(&self, category: Category) {
        self.cache.invalidate(category).await;
    }

    /// Forget every cached endpoint
    pub async fn reset_all(&self) {
        self.cache.invalidate_all().await;
    }

    /// Current cached endpoint per category
    pub fn cached_endpoints(&self) -> BTreeMap<Category, Option<Endpoint>> {
        self.cache.snapshot()
    }

    /// Cache entry for one category, including when it was won
    pub fn cache_entry(&self, category: Category) -> Option<CacheEntry> {
        self.cache.entry(category)
    }

    /// Subscribe to client events
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.event_tx.subscribe()
    }

    /// Per-endpoint health observed so far, sorted by endpoint
    pub fn endpoint_stats(&self) -> Vec<EndpointStats> {
        self.connections.stats()
    }

    /// Requests currently in flight
    pub fn active_connections(&self) -> u64 {
        self.connections.active_connections()
    }

    /// Endpoint pool in configuration order
    pub fn endpoints(&self) -> &[Endpoint] {
        self.pool.endpoints()
    }

    /// Shuffled order the race path draws batches from
    pub fn race_order(&self) -> &[Endpoint] {
        self.coordinator.order()
    }

    /// Get the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        assert!(MirrorClient::new(ClientConfig::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_with_storage_warm_starts() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .save("cache:recommend", "https://b.example.com")
            .await
            .unwrap();

        let config =
            ClientConfig::new().endpoints(["https://a.example.com", "https://b.example.com/"]);
        let client = MirrorClient::with_storage(config, storage).await.unwrap();

        assert_eq!(client.endpoints().len(), 2);
        assert_eq!(
            client.cached_endpoints()[&Category::Recommend],
            Some(Endpoint::new("https://b.example.com"))
        );

        client.reset_all().await;
        assert!(client.cached_endpoints().values().all(Option::is_none));
        assert!(client.endpoint_stats().is_empty());
    }

    #[tokio::test]
    async fn test_race_order_is_a_permutation() {
        let config = ClientConfig::new()
            .endpoints(["https://a.example.com", "https://b.example.com", "https://c.example.com"])
            .shuffle_seed(11);
        let client = MirrorClient::new(config).await.unwrap();

        let mut order = client.race_order().to_vec();
        order.sort();
        assert_eq!(order, client.endpoints().to_vec());
    }

    #[cfg(feature = "storage")]
    #[tokio::test]
    async fn test_unusable_database_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("endpoints.db");
        std::fs::write(&path, vec![b'z'; 4096]).unwrap();

        let config = ClientConfig::new()
            .endpoints(["https://a.example.com", "https://b.example.com"])
            .database_path(&path);
        let client = MirrorClient::new(config).await.unwrap();

        assert!(client.cached_endpoints().values().all(Option::is_none));
        client.reset(Category::Search).await;
    }
}
