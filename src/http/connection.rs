//! Connection Pool Management
//!
//! This module owns the shared HTTP client and keeps client-observed
//! statistics for every mirror it talks to.

use crate::config::HttpConfig;
use crate::error::{ClientError, Result};
use crate::protocol::{Endpoint, EndpointStats, OutcomeRecord};
use chrono::Utc;
use parking_lot::RwLock;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Smoothing factor for the latency moving average
const LATENCY_ALPHA: f64 = 0.2;

/// Shared HTTP client with per-endpoint health statistics
pub struct ConnectionPool {
    /// HTTP client (reqwest handles its own connection pool)
    client: Client,
    /// Requests currently in flight
    active_connections: AtomicU64,
    /// Statistics per endpoint
    stats: RwLock<HashMap<Endpoint, EndpointStats>>,
}

/// Keeps the in-flight gauge accurate even when a request future is dropped
pub struct ConnectionGuard<'a> {
    pool: &'a ConnectionPool,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.pool.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}

impl ConnectionPool {
    /// Create a new connection pool
    pub fn new(config: &HttpConfig, user_agent: &str) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(user_agent)
            .gzip(true)
            .brotli(true);

        // Add proxy if configured
        if let Some(ref proxy_url) = config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| ClientError::invalid_input("proxy_url", e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ClientError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            active_connections: AtomicU64::new(0),
            stats: RwLock::new(HashMap::new()),
        })
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Mark a request as started; the returned guard marks it finished on drop
    pub fn connection_started(&self) -> ConnectionGuard<'_> {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard { pool: self }
    }

    /// Get active connection count
    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Fold one attempt into the endpoint's statistics
    pub fn record(&self, outcome: &OutcomeRecord) {
        let mut stats = self.stats.write();
        let entry = stats
            .entry(outcome.endpoint.clone())
            .or_insert_with(|| EndpointStats {
                endpoint: outcome.endpoint.to_string(),
                ..Default::default()
            });

        entry.attempts += 1;
        entry.last_seen = Some(Utc::now());

        match &outcome.error {
            None => {
                let elapsed = outcome.elapsed.as_secs_f64() * 1000.0;
                entry.avg_latency_ms = if entry.successes == 0 {
                    elapsed
                } else {
                    LATENCY_ALPHA * elapsed + (1.0 - LATENCY_ALPHA) * entry.avg_latency_ms
                };
                entry.successes += 1;
            }
            Some(e) => {
                entry.failures += 1;
                entry.last_error = Some(e.to_string());
            }
        }
    }

    /// Statistics for one endpoint
    pub fn stats_for(&self, endpoint: &Endpoint) -> Option<EndpointStats> {
        self.stats.read().get(endpoint).cloned()
    }

    /// Snapshot of all statistics, sorted by endpoint
    pub fn stats(&self) -> Vec<EndpointStats> {
        let mut all: Vec<_> = self.stats.read().values().cloned().collect();
        all.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        all
    }
}
