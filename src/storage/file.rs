//! File-backed backend
//!
//! One JSON document per namespace (`<dir>/<namespace>.json`). The document is
//! loaded once at open; every mutation rewrites it through a temporary file and
//! an atomic rename, so a crash leaves either the old or the new document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use super::{DurableBackend, StorageResult};
use crate::error::StorageError;

/// Durable namespace stored as a single JSON document.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    records: Mutex<BTreeMap<String, Value>>,
}

impl FileBackend {
    /// Opens (or creates) `<dir>/<namespace>.json`.
    ///
    /// Fails with `StorageError::Unavailable` when the directory cannot be
    /// created, the document cannot be parsed, or it cannot be written.
    pub async fn open(dir: &Path, namespace: &str) -> StorageResult<Self> {
        fs::create_dir_all(dir).await.map_err(|e| {
            StorageError::Unavailable(format!("creating {}: {}", dir.display(), e))
        })?;

        let path = dir.join(format!("{}.json", namespace));
        let records = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::Unavailable(format!("parsing {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(StorageError::Unavailable(format!(
                    "reading {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let backend = Self {
            path,
            records: Mutex::new(BTreeMap::new()),
        };
        // Writing once up front surfaces a read-only location at open time.
        backend
            .commit(&records)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        debug!(
            "Opened durable store {} with {} records",
            backend.path.display(),
            records.len()
        );
        *backend.records.lock().await = records;

        Ok(backend)
    }

    /// Location of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn commit(&self, records: &BTreeMap<String, Value>) -> StorageResult<()> {
        let bytes = serde_json::to_vec(records)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl DurableBackend for FileBackend {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, record: Value) -> StorageResult<()> {
        let mut records = self.records.lock().await;
        let previous = records.insert(key.to_string(), record);
        if let Err(err) = self.commit(&records).await {
            // Roll back so memory matches what is on disk
            match previous {
                Some(value) => records.insert(key.to_string(), value),
                None => records.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let mut records = self.records.lock().await;
        let Some(previous) = records.remove(key) else {
            return Ok(());
        };
        if let Err(err) = self.commit(&records).await {
            records.insert(key.to_string(), previous);
            return Err(err);
        }
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        let mut records = self.records.lock().await;
        let empty = BTreeMap::new();
        self.commit(&empty).await?;
        *records = empty;
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Value)>> {
        let records = self.records.lock().await;
        Ok(records
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
