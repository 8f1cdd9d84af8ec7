//! Client configuration
//!
//! This module contains all configuration options for the mirror client.
//! Configuration is static: nothing here can be changed once a client has
//! been built from it.

use crate::error::{ClientError, Result};
use crate::http::EndpointPool;
use crate::protocol::Category;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the mirror client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Mirror base URLs making up the endpoint pool
    pub endpoints: Vec<String>,

    /// Endpoints raced together in one batch
    pub batch_size: usize,

    /// Deadline for the single attempt against a cached endpoint (ms)
    pub fast_path_timeout_ms: u64,

    /// Deadline for each attempt inside a race batch (ms)
    pub race_timeout_ms: u64,

    /// Deadline for each attempt during calibration (ms)
    pub probe_timeout_ms: u64,

    /// Per-category timeout overrides
    #[serde(default)]
    pub category_timeouts: BTreeMap<Category, TimeoutOverride>,

    /// Probe path per category used by calibration.
    /// Categories not listed use their built-in probe path.
    #[serde(default)]
    pub probe_paths: BTreeMap<Category, String>,

    /// Seed for the once-per-client shuffle of the pool (None = random)
    #[serde(default)]
    pub shuffle_seed: Option<u64>,

    /// User agent sent to mirrors
    pub user_agent: String,

    /// Database path for warm-start persistence (None = in-memory only)
    pub database_path: Option<PathBuf>,

    /// How mirrors encode application-level failures
    #[serde(default)]
    pub response: ResponseConfig,

    /// HTTP configuration
    pub http: HttpConfig,
}

/// Timeout overrides for one category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutOverride {
    /// Fast-path deadline in milliseconds
    pub fast_path_ms: Option<u64>,
    /// Race attempt deadline in milliseconds
    pub race_ms: Option<u64>,
}

/// Response body conventions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Top-level field carrying the application status code
    #[serde(default = "default_code_field")]
    pub code_field: String,

    /// Value of the code field meaning success
    #[serde(default = "default_success_code")]
    pub success_code: i64,
}

fn default_code_field() -> String {
    "code".to_string()
}

fn default_success_code() -> i64 {
    200
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            code_field: default_code_field(),
            success_code: default_success_code(),
        }
    }
}

/// HTTP-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Connection timeout in seconds
    pub connect_timeout: u64,

    /// Maximum redirects to follow
    pub max_redirects: usize,

    /// Whether to accept invalid TLS certificates (dangerous!)
    pub accept_invalid_certs: bool,

    /// Proxy URL (e.g., "http://proxy:8080" or "socks5://proxy:1080")
    pub proxy_url: Option<String>,

    /// Idle keep-alive connections kept per mirror
    #[serde(default = "default_pool_max_idle")]
    pub pool_max_idle_per_host: usize,
}

fn default_pool_max_idle() -> usize {
    8
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            batch_size: 4,
            fast_path_timeout_ms: 3_000,
            race_timeout_ms: 8_000,
            probe_timeout_ms: 10_000,
            category_timeouts: BTreeMap::new(),
            probe_paths: BTreeMap::new(),
            shuffle_seed: None,
            user_agent: format!("mirror-race/{}", env!("CARGO_PKG_VERSION")),
            database_path: None,
            response: ResponseConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: 5,
            max_redirects: 5,
            accept_invalid_certs: false,
            proxy_url: None,
            pool_max_idle_per_host: default_pool_max_idle(),
        }
    }
}

impl ClientConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the endpoint pool
    pub fn endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Add one endpoint to the pool
    pub fn add_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoints.push(url.into());
        self
    }

    /// Set the race batch size
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the fast-path timeout
    pub fn fast_path_timeout(mut self, timeout: Duration) -> Self {
        self.fast_path_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the per-attempt race timeout
    pub fn race_timeout(mut self, timeout: Duration) -> Self {
        self.race_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the per-attempt calibration timeout
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Override timeouts for one category
    pub fn category_timeout(mut self, category: Category, timeouts: TimeoutOverride) -> Self {
        self.category_timeouts.insert(category, timeouts);
        self
    }

    /// Override the calibration probe path for one category
    pub fn probe_path(mut self, category: Category, path: impl Into<String>) -> Self {
        self.probe_paths.insert(category, path.into());
        self
    }

    /// Fix the pool shuffle seed
    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    /// Set the database path for persistence
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Persist to the per-user data directory
    pub fn persist_default(mut self) -> Self {
        self.database_path = Some(default_database_path());
        self
    }

    /// Set the response code conventions
    pub fn response(mut self, response: ResponseConfig) -> Self {
        self.response = response;
        self
    }

    /// Fast-path deadline for a category
    pub fn fast_path_timeout_for(&self, category: Category) -> Duration {
        let ms = self
            .category_timeouts
            .get(&category)
            .and_then(|t| t.fast_path_ms)
            .unwrap_or(self.fast_path_timeout_ms);
        Duration::from_millis(ms)
    }

    /// Race attempt deadline for a category
    pub fn race_timeout_for(&self, category: Category) -> Duration {
        let ms = self
            .category_timeouts
            .get(&category)
            .and_then(|t| t.race_ms)
            .unwrap_or(self.race_timeout_ms);
        Duration::from_millis(ms)
    }

    /// Calibration attempt deadline
    pub fn probe_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Calibration probe path for a category
    pub fn probe_path_for(&self, category: Category) -> &str {
        self.probe_paths
            .get(&category)
            .map(String::as_str)
            .unwrap_or_else(|| category.default_probe_path())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        EndpointPool::new(&self.endpoints)?;

        if self.batch_size == 0 {
            return Err(ClientError::invalid_input("batch_size", "Must be at least 1"));
        }

        for (field, value) in [
            ("fast_path_timeout_ms", self.fast_path_timeout_ms),
            ("race_timeout_ms", self.race_timeout_ms),
            ("probe_timeout_ms", self.probe_timeout_ms),
        ] {
            if value == 0 {
                return Err(ClientError::invalid_input(field, "Must be greater than zero"));
            }
        }

        for overrides in self.category_timeouts.values() {
            if overrides.fast_path_ms == Some(0) || overrides.race_ms == Some(0) {
                return Err(ClientError::invalid_input(
                    "category_timeouts",
                    "Overrides must be greater than zero",
                ));
            }
        }

        if self.response.code_field.is_empty() {
            return Err(ClientError::invalid_input("response.code_field", "Must not be empty"));
        }

        Ok(())
    }

}

/// Per-user database location, falling back to the working directory
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mirror-race")
        .join("endpoints.db")
}
