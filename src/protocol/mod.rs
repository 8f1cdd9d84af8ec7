//! Protocol types for mirror-race
//!
//! This module contains the types that cross the client boundary:
//! - Endpoints and categories
//! - Cache entries and attempt outcomes
//! - Events emitted by the client
//! - Per-request options

mod events;
mod options;
mod status;
mod types;

pub use events::ClientEvent;
pub use options::RequestOptions;
pub use status::{EndpointStats, OutcomeRecord};
pub use types::{CacheEntry, Category, Endpoint};
