//! HTTP layer
//!
//! This module handles everything that touches the wire:
//! - The shared reqwest client and per-endpoint statistics
//! - The immutable endpoint pool and its batch partitioning
//! - Deadline-bounded, cancellable JSON GET requests

pub mod connection;
pub mod mirror;
pub mod timed;

pub use connection::{ConnectionGuard, ConnectionPool};
pub use mirror::{batches, EndpointPool};
pub use timed::{check_api_code, request_url, MirrorResponse, TimedRequest, CACHE_BUST_PARAM};
