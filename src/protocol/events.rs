//! Client events
//!
//! Events emitted by the mirror client.

use super::types::{Category, Endpoint};
use serde::{Deserialize, Serialize};

/// Events emitted by the mirror client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEvent {
    /// A category now points at a new winning endpoint
    CacheUpdated {
        category: Category,
        endpoint: Endpoint,
    },
    /// A category's cached endpoint was dropped
    CacheInvalidated { category: Category },
    /// A race batch produced a winner
    RaceWon {
        category: Category,
        endpoint: Endpoint,
        elapsed_ms: u64,
        /// Zero-based index of the batch that won
        batch: usize,
    },
    /// Every endpoint tried for a call failed
    RaceExhausted { category: Category, attempted: usize },
    /// A calibration run finished
    CalibrationFinished {
        category: Category,
        endpoint: Option<Endpoint>,
    },
}
