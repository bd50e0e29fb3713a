//! Typed view over a backend
//!
//! Encodes records with serde_json so callers work with their own structs.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use super::{DurableBackend, StorageResult};

/// Result of [`TypedStore::scan_all`].
#[derive(Debug)]
pub struct Scan<R> {
    pub records: Vec<R>,
    /// Keys whose stored value is not a valid `R`
    pub undecodable: Vec<String>,
}

/// A `DurableBackend` restricted to records of type `R`.
pub struct TypedStore<R> {
    backend: Arc<dyn DurableBackend>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for TypedStore<R> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            _record: PhantomData,
        }
    }
}

impl<R> TypedStore<R>
where
    R: Serialize + DeserializeOwned,
{
    pub fn new(backend: Arc<dyn DurableBackend>) -> Self {
        Self {
            backend,
            _record: PhantomData,
        }
    }

    pub async fn get(&self, key: &str) -> StorageResult<Option<R>> {
        match self.backend.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn put(&self, key: &str, record: &R) -> StorageResult<()> {
        self.backend.put(key, serde_json::to_value(record)?).await
    }

    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        self.backend.delete(key).await
    }

    pub async fn clear(&self) -> StorageResult<()> {
        self.backend.clear().await
    }

    /// Decodes every record on its own. Records that fail to decode are
    /// reported by key instead of failing the scan.
    pub async fn scan_all(&self) -> StorageResult<Scan<R>> {
        let mut scan = Scan {
            records: Vec::new(),
            undecodable: Vec::new(),
        };
        for (key, value) in self.backend.scan_all().await? {
            match serde_json::from_value(value) {
                Ok(record) => scan.records.push(record),
                Err(err) => {
                    warn!("Record '{}' does not decode: {}", key, err);
                    scan.undecodable.push(key);
                }
            }
        }
        Ok(scan)
    }
}
