//! Endpoint pool
//!
//! The fixed set of mirrors a client may talk to. The pool has no ranking
//! of its own; it only answers membership questions and hands out the
//! shuffled ordering the coordinator partitions into race batches.

use crate::error::{ClientError, Result};
use crate::protocol::Endpoint;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::slice::Chunks;

/// Immutable list of mirror base URLs
#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<Endpoint>,
}

impl EndpointPool {
    /// Create a pool from base URLs
    ///
    /// Every URL must be an absolute http(s) URL and appear only once.
    pub fn new<I, S>(urls: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut endpoints: Vec<Endpoint> = Vec::new();
        for raw in urls {
            let endpoint = Endpoint::new(raw.as_ref());
            let parsed = url::Url::parse(endpoint.as_str()).map_err(|e| {
                ClientError::invalid_input("endpoints", format!("Invalid URL {}: {}", endpoint, e))
            })?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(ClientError::invalid_input(
                    "endpoints",
                    format!("Unsupported scheme in {}", endpoint),
                ));
            }
            if endpoints.contains(&endpoint) {
                return Err(ClientError::invalid_input(
                    "endpoints",
                    format!("Duplicate endpoint: {}", endpoint),
                ));
            }
            endpoints.push(endpoint);
        }

        if endpoints.is_empty() {
            return Err(ClientError::invalid_input(
                "endpoints",
                "At least one endpoint is required",
            ));
        }

        Ok(Self { endpoints })
    }

    /// All endpoints in configuration order
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Whether the endpoint is a member of this pool
    pub fn contains(&self, endpoint: &Endpoint) -> bool {
        self.endpoints.contains(endpoint)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// A shuffled copy of the pool.
    ///
    /// With a seed the order is reproducible; without one it is not, and
    /// callers must not depend on which endpoint comes first.
    pub fn shuffled(&self, seed: Option<u64>) -> Vec<Endpoint> {
        let mut order = self.endpoints.clone();
        match seed {
            Some(seed) => order.shuffle(&mut StdRng::seed_from_u64(seed)),
            None => order.shuffle(&mut rand::thread_rng()),
        }
        order
    }
}

/// Split an ordering into consecutive, non-overlapping race batches
pub fn batches(order: &[Endpoint], batch_size: usize) -> Chunks<'_, Endpoint> {
    order.chunks(batch_size.max(1))
}
