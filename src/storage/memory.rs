//! In-process backend
//!
//! Holds records in an ordered map. Nothing survives a restart; used for
//! memory-only deployments and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{DurableBackend, StorageResult};

/// Ordered in-memory record map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<BTreeMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DurableBackend for MemoryBackend {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, record: Value) -> StorageResult<()> {
        self.records.write().await.insert(key.to_string(), record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        self.records.write().await.clear();
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Value)>> {
        let records = self.records.read().await;
        Ok(records
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_delete() {
        let backend = MemoryBackend::new();

        backend.put("a", json!({"n": 1})).await.unwrap();
        assert_eq!(backend.get("a").await.unwrap(), Some(json!({"n": 1})));

        backend.delete("a").await.unwrap();
        assert_eq!(backend.get("a").await.unwrap(), None);

        // Deleting twice is fine
        backend.delete("a").await.unwrap();
    }

    #[tokio::test]
    async fn test_scan_prefix_only_matches_prefix() {
        let backend = MemoryBackend::new();
        for key in ["batch_1", "batch_2", "batches", "doc_1", "a"] {
            backend.put(key, json!(key)).await.unwrap();
        }

        let keys: Vec<String> = backend
            .scan_prefix("batch_")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["batch_1", "batch_2"]);

        assert_eq!(backend.scan_all().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_clear() {
        let backend = MemoryBackend::new();
        backend.put("x", json!(1)).await.unwrap();
        backend.put("y", json!(2)).await.unwrap();

        backend.clear().await.unwrap();
        assert!(backend.is_empty().await);
    }
}
