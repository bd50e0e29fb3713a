//! Durable Storage Module
//!
//! Asynchronous key-value backends that survive (or, for tests, imitate)
//! process restarts. Backends know nothing about cache or queue semantics;
//! records are plain JSON documents addressed by string keys.

mod file;
mod memory;
mod typed;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::error::StorageError;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use typed::{Scan, TypedStore};

/// Convenience Result type for backend calls.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// == Durable Backend ==
/// Abstract transactional key-value store.
///
/// Every call is its own transaction: the implementation acquires whatever
/// handle it needs, commits, and releases it before returning, on success and
/// on error alike. Opening is left to each implementation's constructor, which
/// reports `StorageError::Unavailable` when the store cannot be used.
#[async_trait]
pub trait DurableBackend: Send + Sync {
    /// Fetches one record
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Inserts or replaces one record
    async fn put(&self, key: &str, record: Value) -> StorageResult<()>;

    /// Removes one record; removing an absent key is not an error
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Removes every record
    async fn clear(&self) -> StorageResult<()>;

    /// Returns all records whose key starts with `prefix`, ordered by key
    async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Value)>>;

    /// Returns every record, ordered by key
    async fn scan_all(&self) -> StorageResult<Vec<(String, Value)>> {
        self.scan_prefix("").await
    }
}

/// Opens a file-backed namespace, degrading to `None` when the store is unusable.
///
/// The caller treats `None` as "persistence disabled for this session".
pub async fn open_or_degrade(dir: &Path, namespace: &str) -> Option<Arc<dyn DurableBackend>> {
    match FileBackend::open(dir, namespace).await {
        Ok(backend) => Some(Arc::new(backend)),
        Err(err) => {
            warn!(
                "Durable store '{}' unavailable, continuing without persistence: {}",
                namespace, err
            );
            None
        }
    }
}
