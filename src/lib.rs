//! Resilient Cache - an offline-first data layer
//!
//! A two-tier TTL cache for read results and a durable FIFO queue that
//! replays mutations once connectivity returns.

pub mod api;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod models;
pub mod queue;
pub mod storage;
pub mod tasks;
pub mod transport;

pub use api::AppState;
pub use cache::{CacheStats, CacheStore};
pub use config::{Config, StoreConfig};
pub use connectivity::Connectivity;
pub use error::{Error, Result, StorageError, TransportError};
pub use queue::{OfflineQueue, PendingOperation, RequestOutcome, SyncReport};
pub use tasks::{spawn_cleanup_task, spawn_probe_task, spawn_sync_task};
