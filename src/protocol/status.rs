//! Attempt outcomes and endpoint statistics

use super::types::Endpoint;
use crate::error::ClientError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of one request against one endpoint
///
/// Ephemeral: used for logging, statistics and the diagnostics carried by
/// [`ClientError::NoReachableEndpoint`]. Never persisted.
#[derive(Debug, Clone)]
pub struct OutcomeRecord {
    /// Endpoint that was contacted
    pub endpoint: Endpoint,
    /// Wall time from start to completion or abort
    pub elapsed: Duration,
    /// Failure cause, `None` on success
    pub error: Option<ClientError>,
}

impl OutcomeRecord {
    pub fn success(endpoint: Endpoint, elapsed: Duration) -> Self {
        Self {
            endpoint,
            elapsed,
            error: None,
        }
    }

    pub fn failure(endpoint: Endpoint, elapsed: Duration, error: ClientError) -> Self {
        Self {
            endpoint,
            elapsed,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl std::fmt::Display for OutcomeRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error {
            None => write!(f, "{} ok in {}ms", self.endpoint, self.elapsed.as_millis()),
            Some(e) => write!(
                f,
                "{} failed after {}ms: {}",
                self.endpoint,
                self.elapsed.as_millis(),
                e
            ),
        }
    }
}

/// Accumulated client-observed health of one endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointStats {
    /// Endpoint these numbers describe
    pub endpoint: String,
    /// Total requests issued
    pub attempts: u64,
    /// Requests that returned usable data
    pub successes: u64,
    /// Requests that failed for any endpoint-level reason
    pub failures: u64,
    /// Exponential moving average latency of successful requests
    pub avg_latency_ms: f64,
    /// Last error message
    pub last_error: Option<String>,
    /// When the endpoint was last contacted
    pub last_seen: Option<DateTime<Utc>>,
}

impl EndpointStats {
    /// Fraction of attempts that succeeded (0.0 when never tried)
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}
