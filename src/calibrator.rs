//! Calibrator
//!
//! Forces a fresh race for a category regardless of what is cached, using a
//! cheap probe request representative of that category's traffic.

use crate::cache::CategoryCache;
use crate::config::ClientConfig;
use crate::coordinator::race_batches;
use crate::error::Result;
use crate::http::{EndpointPool, TimedRequest};
use crate::protocol::{Category, ClientEvent, Endpoint};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

pub struct Calibrator {
    pool: Arc<EndpointPool>,
    cache: Arc<CategoryCache>,
    requester: TimedRequest,
    config: Arc<ClientConfig>,
    event_tx: broadcast::Sender<ClientEvent>,
}

impl Calibrator {
    pub fn new(
        pool: Arc<EndpointPool>,
        cache: Arc<CategoryCache>,
        requester: TimedRequest,
        config: Arc<ClientConfig>,
        event_tx: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            pool,
            cache,
            requester,
            config,
            event_tx,
        }
    }

    /// Re-race every endpoint for `category`.
    ///
    /// The cached entry is dropped first, so a failed calibration leaves the
    /// category uncached. Returns the new winner, if any.
    pub async fn refresh(&self, category: Category) -> Result<Option<Endpoint>> {
        self.cache.invalidate(category).await;

        let endpoints = self.pool.endpoints();
        let path = self.config.probe_path_for(category);
        tracing::debug!(
            "Calibrating {} across {} endpoints with {}",
            category,
            endpoints.len(),
            path
        );

        let mut failures = Vec::new();
        let winner = race_batches(
            &self.requester,
            endpoints,
            endpoints.len(),
            path,
            self.config.probe_timeout_duration(),
            &CancellationToken::new(),
            &mut failures,
        )
        .await?;

        let endpoint = match winner {
            Some((_, response)) => {
                tracing::info!(
                    "Calibrated {} -> {} ({}ms)",
                    category,
                    response.endpoint,
                    response.elapsed.as_millis()
                );
                self.cache.set(category, response.endpoint.clone()).await;
                Some(response.endpoint)
            }
            None => {
                tracing::warn!(
                    "Calibration for {} found no reachable endpoint ({} failures)",
                    category,
                    failures.len()
                );
                None
            }
        };

        let _ = self.event_tx.send(ClientEvent::CalibrationFinished {
            category,
            endpoint: endpoint.clone(),
        });
        Ok(endpoint)
    }

    /// [`refresh`](Self::refresh) every category, one after another
    pub async fn refresh_all(&self) -> Result<BTreeMap<Category, Option<Endpoint>>> {
        let mut results = BTreeMap::new();
        for category in Category::ALL {
            results.insert(category, self.refresh(category).await?);
        }
        Ok(results)
    }
}
