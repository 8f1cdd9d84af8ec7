//! Per-request options

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Options for a single coordinator call
///
/// Unset timeouts fall back to the client configuration for the request's
/// category.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Deadline for the single attempt against the cached endpoint
    pub fast_path_timeout: Option<Duration>,
    /// Deadline for each attempt inside a race batch
    pub race_timeout: Option<Duration>,
    /// Cancels every pending transfer of this call when fired
    pub cancel_token: Option<CancellationToken>,
}

impl RequestOptions {
    /// Create options with defaults from the configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the fast-path timeout
    pub fn fast_path_timeout(mut self, timeout: Duration) -> Self {
        self.fast_path_timeout = Some(timeout);
        self
    }

    /// Override the per-attempt race timeout
    pub fn race_timeout(mut self, timeout: Duration) -> Self {
        self.race_timeout = Some(timeout);
        self
    }

    /// Attach a cancellation token (e.g. tied to a UI view's lifetime)
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }
}
