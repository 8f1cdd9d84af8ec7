//! Failover coordinator
//!
//! Serves a request from the category's cached endpoint when it can, and
//! otherwise races the pool batch by batch until some endpoint answers.

use crate::cache::CategoryCache;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::http::{batches, EndpointPool, MirrorResponse, TimedRequest};
use crate::protocol::{Category, ClientEvent, Endpoint, OutcomeRecord, RequestOptions};
use crate::race::race_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Drives the fast path and the batched race path for one client
pub struct FailoverCoordinator {
    /// Pool order, shuffled once at construction
    order: Vec<Endpoint>,
    cache: Arc<CategoryCache>,
    requester: TimedRequest,
    config: Arc<ClientConfig>,
    event_tx: broadcast::Sender<ClientEvent>,
}

impl FailoverCoordinator {
    pub fn new(
        pool: &EndpointPool,
        cache: Arc<CategoryCache>,
        requester: TimedRequest,
        config: Arc<ClientConfig>,
        event_tx: broadcast::Sender<ClientEvent>,
    ) -> Self {
        let order = pool.shuffled(config.shuffle_seed);
        tracing::debug!(
            "Race order: {}",
            order
                .iter()
                .map(Endpoint::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self {
            order,
            cache,
            requester,
            config,
            event_tx,
        }
    }

    /// The order batches are drawn from
    pub fn order(&self) -> &[Endpoint] {
        &self.order
    }

    /// Fetch `path` for `category`, failing over across the pool as needed.
    ///
    /// Fails with [`ClientError::NoReachableEndpoint`] when every endpoint
    /// tried in this call failed, or [`ClientError::Cancelled`] when the
    /// caller's token fired first.
    pub async fn request(
        &self,
        path: &str,
        category: Category,
        options: &RequestOptions,
    ) -> Result<Value> {
        let cancel = options.cancel_token.clone().unwrap_or_default();
        let mut failures = Vec::new();
        let mut failed_fast = None;

        if let Some(endpoint) = self.cache.get(category) {
            let timeout = options
                .fast_path_timeout
                .unwrap_or_else(|| self.config.fast_path_timeout_for(category));

            match self
                .requester
                .attempt(endpoint.clone(), path, timeout, &cancel)
                .await
            {
                Ok(response) => {
                    tracing::debug!(
                        "Cache hit for {}: {} in {}ms",
                        category,
                        endpoint,
                        response.elapsed.as_millis()
                    );
                    return Ok(response.body);
                }
                Err(outcome) => {
                    if matches!(outcome.error, Some(ClientError::Cancelled)) {
                        return Err(ClientError::Cancelled);
                    }
                    tracing::debug!("Fast path failed for {}: {}", category, outcome);
                    // Must land before the race can set a new winner. A
                    // winner a concurrent call stored meanwhile stays.
                    self.cache.invalidate_if(category, &endpoint).await;
                    failures.push(outcome);
                    failed_fast = Some(endpoint);
                }
            }
        }

        let candidates: Vec<Endpoint> = self
            .order
            .iter()
            .filter(|endpoint| Some(*endpoint) != failed_fast.as_ref())
            .cloned()
            .collect();
        let timeout = options
            .race_timeout
            .unwrap_or_else(|| self.config.race_timeout_for(category));

        let winner = race_batches(
            &self.requester,
            &candidates,
            self.config.batch_size,
            path,
            timeout,
            &cancel,
            &mut failures,
        )
        .await?;

        match winner {
            Some((batch, response)) => {
                tracing::info!(
                    "{} won race for {} in {}ms (batch {})",
                    response.endpoint,
                    category,
                    response.elapsed.as_millis(),
                    batch
                );
                let _ = self.event_tx.send(ClientEvent::RaceWon {
                    category,
                    endpoint: response.endpoint.clone(),
                    elapsed_ms: response.elapsed.as_millis() as u64,
                    batch,
                });
                self.cache.set(category, response.endpoint).await;
                Ok(response.body)
            }
            None => {
                tracing::warn!(
                    "No reachable endpoint for {} ({} attempts failed)",
                    category,
                    failures.len()
                );
                let _ = self.event_tx.send(ClientEvent::RaceExhausted {
                    category,
                    attempted: failures.len(),
                });
                Err(ClientError::NoReachableEndpoint { category, failures })
            }
        }
    }
}

/// Race `order` in consecutive batches of `batch_size`.
///
/// Returns the winning batch index and response, or `None` once every batch
/// has failed. Each failed attempt is appended to `failures`. Batch k+1 is
/// only started after batch k has resolved.
pub(crate) async fn race_batches(
    requester: &TimedRequest,
    order: &[Endpoint],
    batch_size: usize,
    path: &str,
    timeout: Duration,
    cancel: &CancellationToken,
    failures: &mut Vec<OutcomeRecord>,
) -> Result<Option<(usize, MirrorResponse)>> {
    for (index, batch) in batches(order, batch_size).enumerate() {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        tracing::debug!("Racing batch {} ({} endpoints)", index, batch.len());
        let token = cancel.child_token();
        let operations = batch.iter().cloned().map(|endpoint| {
            let requester = requester.clone();
            let path = path.to_string();
            let token = token.clone();
            async move { requester.attempt(endpoint, &path, timeout, &token).await }
        });

        match race_all(operations).await {
            Ok(response) => return Ok(Some((index, response))),
            Err(e) => {
                if cancel.is_cancelled() {
                    return Err(ClientError::Cancelled);
                }
                failures.extend(e.into_errors());
            }
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResponseConfig;
    use crate::http::ConnectionPool;

    fn requester(config: &ClientConfig) -> TimedRequest {
        let pool = ConnectionPool::new(&config.http, &config.user_agent).unwrap();
        TimedRequest::new(Arc::new(pool), ResponseConfig::default())
    }

    #[tokio::test]
    async fn test_order_is_shuffled_once_and_seeded() {
        let config = Arc::new(
            ClientConfig::new()
                .endpoints((0..6).map(|i| format!("https://m{}.example.com", i)))
                .shuffle_seed(42),
        );
        let pool = EndpointPool::new(&config.endpoints).unwrap();
        let tx = broadcast::channel(16).0;

        let first = FailoverCoordinator::new(
            &pool,
            Arc::new(CategoryCache::new(None, tx.clone())),
            requester(&config),
            config.clone(),
            tx.clone(),
        );
        let second = FailoverCoordinator::new(
            &pool,
            Arc::new(CategoryCache::new(None, tx.clone())),
            requester(&config),
            config.clone(),
            tx,
        );

        assert_eq!(first.order(), second.order());
        assert_eq!(first.order().len(), 6);
    }

    #[tokio::test]
    async fn test_race_batches_cancelled_before_start() {
        let config = ClientConfig::new().endpoints(["http://127.0.0.1:9"]);
        let order = vec![Endpoint::new("http://127.0.0.1:9")];
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut failures = Vec::new();
        let result = race_batches(
            &requester(&config),
            &order,
            4,
            "/ping",
            Duration::from_millis(200),
            &cancel,
            &mut failures,
        )
        .await;

        assert!(matches!(result, Err(ClientError::Cancelled)));
        assert!(failures.is_empty());
    }

    #[tokio::test]
    async fn test_race_batches_empty_order() {
        let config = ClientConfig::new().endpoints(["http://127.0.0.1:9"]);
        let mut failures = Vec::new();
        let result = race_batches(
            &requester(&config),
            &[],
            4,
            "/ping",
            Duration::from_millis(200),
            &CancellationToken::new(),
            &mut failures,
        )
        .await
        .unwrap();

        assert!(result.is_none());
        assert!(failures.is_empty());
    }
}
