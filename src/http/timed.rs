//! Single deadline-bounded GET against one mirror
//!
//! A request either yields a JSON body that passed both the transport-level
//! and the application-level status checks, or fails with exactly one
//! endpoint-level cause. Mirrors frequently answer `200 OK` with a body like
//! `{"code": 405, "message": "..."}`; such answers are failures.

use super::connection::ConnectionPool;
use crate::config::ResponseConfig;
use crate::error::{ClientError, Result};
use crate::protocol::{Endpoint, OutcomeRecord};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Query parameter appended to every request to defeat intermediary caches
pub const CACHE_BUST_PARAM: &str = "timestamp";

/// Successful answer from one mirror
#[derive(Debug, Clone)]
pub struct MirrorResponse {
    /// Endpoint that answered
    pub endpoint: Endpoint,
    /// Parsed JSON body
    pub body: Value,
    /// Time from request start to parsed body
    pub elapsed: Duration,
}

/// Executes deadline-bounded GET requests
#[derive(Clone)]
pub struct TimedRequest {
    pool: Arc<ConnectionPool>,
    response: Arc<ResponseConfig>,
}

impl TimedRequest {
    pub fn new(pool: Arc<ConnectionPool>, response: ResponseConfig) -> Self {
        Self {
            pool,
            response: Arc::new(response),
        }
    }

    /// GET `{endpoint}{path}` within `timeout`.
    ///
    /// Dropping the transfer on timeout or cancellation aborts it.
    pub async fn execute(
        &self,
        endpoint: &Endpoint,
        path: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let url = request_url(endpoint, path)?;
        let _guard = self.pool.connection_started();

        let transfer = async {
            let response = self.pool.client().get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ClientError::Http {
                    status: status.as_u16(),
                });
            }

            let bytes = response.bytes().await?;
            let body: Value = serde_json::from_slice(&bytes)?;
            check_api_code(&body, &self.response)?;
            Ok::<Value, ClientError>(body)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ClientError::Cancelled),
            result = tokio::time::timeout(timeout, transfer) => match result {
                Ok(result) => result,
                Err(_) => Err(ClientError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                }),
            },
        }
    }

    /// [`execute`](Self::execute) plus outcome bookkeeping.
    ///
    /// The outcome is recorded into the pool statistics and logged; on failure
    /// it is also returned so callers can aggregate diagnostics.
    pub async fn attempt(
        &self,
        endpoint: Endpoint,
        path: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> std::result::Result<MirrorResponse, OutcomeRecord> {
        let start = Instant::now();
        let result = self.execute(&endpoint, path, timeout, cancel).await;
        let elapsed = start.elapsed();

        match result {
            Ok(body) => {
                let outcome = OutcomeRecord::success(endpoint.clone(), elapsed);
                tracing::debug!("{}", outcome);
                self.pool.record(&outcome);
                Ok(MirrorResponse {
                    endpoint,
                    body,
                    elapsed,
                })
            }
            Err(e) => {
                let outcome = OutcomeRecord::failure(endpoint, elapsed, e);
                tracing::debug!("{}", outcome);
                // Cancellation says nothing about the mirror's health
                if outcome.error.as_ref().is_some_and(ClientError::is_endpoint_failure) {
                    self.pool.record(&outcome);
                }
                Err(outcome)
            }
        }
    }
}

/// Build the request URL with the cache-busting parameter appended
pub fn request_url(endpoint: &Endpoint, path: &str) -> Result<Url> {
    let mut url = Url::parse(&endpoint.join(path))?;
    url.query_pairs_mut()
        .append_pair(CACHE_BUST_PARAM, &Utc::now().timestamp_millis().to_string());
    Ok(url)
}

/// Reject bodies whose code field is present and not the success value.
///
/// An absent (or null) field counts as success.
pub fn check_api_code(body: &Value, config: &ResponseConfig) -> Result<()> {
    let code = match body.get(&config.code_field) {
        None | Some(Value::Null) => return Ok(()),
        Some(code) => code,
    };

    let numeric = match code {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match numeric {
        Some(code) if code == config.success_code => Ok(()),
        Some(code) => Err(ClientError::LogicalApi {
            code,
            message: api_message(body),
        }),
        None => Err(ClientError::InvalidResponse(format!(
            "Non-numeric '{}' field: {}",
            config.code_field, code
        ))),
    }
}

/// `200.0` is a code, `200.9` is not
fn integral(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64).then_some(f as i64)
}

fn api_message(body: &Value) -> Option<String> {
    ["message", "msg"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
