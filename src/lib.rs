//! # mirror-race
//!
//! An adaptive client for a pool of interchangeable API mirrors.
//!
//! ## Features
//!
//! - **Per-category fast path**: each request category remembers the mirror
//!   that last answered it fastest and goes straight there
//! - **Batched failover**: when the cached mirror fails, the pool is raced in
//!   small concurrent batches and the first success wins
//! - **Logical error detection**: `200 OK` bodies carrying a failure code are
//!   treated as failures
//! - **Warm start**: winners are persisted to SQLite and restored on launch
//! - **Async**: Built on Tokio; every attempt is deadline-bounded and cancellable
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mirror_race::{Category, ClientConfig, MirrorClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new().endpoints([
//!         "https://mirror-a.example.com",
//!         "https://mirror-b.example.com",
//!         "https://mirror-c.example.com",
//!     ]);
//!     let client = MirrorClient::new(config).await?;
//!
//!     // Races the pool on first use, then sticks to the winner
//!     let lyrics = client.request("/lyric?id=33894312", Category::Lyrics).await?;
//!     println!("{}", lyrics);
//!
//!     // Subscribe to events
//!     let mut events = client.subscribe();
//!     client.refresh(Category::Search).await?;
//!     while let Ok(event) = events.try_recv() {
//!         println!("Event: {:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

// Modules
pub mod cache;
pub mod calibrator;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod protocol;
pub mod race;
pub mod storage;

// Re-exports for convenience
pub use cache::CategoryCache;
pub use calibrator::Calibrator;
pub use client::MirrorClient;
pub use config::{default_database_path, ClientConfig, HttpConfig, ResponseConfig, TimeoutOverride};
pub use coordinator::FailoverCoordinator;
pub use error::{ClientError, NetworkErrorKind, RaceError, Result};
pub use protocol::{
    CacheEntry, Category, ClientEvent, Endpoint, EndpointStats, OutcomeRecord, RequestOptions,
};
pub use race::race_all;

// Storage exports
#[cfg(feature = "storage")]
pub use storage::SqliteStorage;
pub use storage::{MemoryStorage, Storage, StoredValue};

// HTTP module exports
pub use http::{ConnectionPool, EndpointPool, MirrorResponse, TimedRequest};

// Cancellation tokens appear in the public API
pub use tokio_util::sync::CancellationToken;
