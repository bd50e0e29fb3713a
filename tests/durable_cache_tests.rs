//! Integration Tests for Durable Storage
//!
//! Cache and queue contents surviving a restart on the file backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use resilient_cache::{
    storage::{open_or_degrade, DurableBackend, FileBackend},
    transport::{HttpMethod, Transport},
    CacheStore, Connectivity, OfflineQueue, StoreConfig, TransportError,
};
use serde_json::{json, Value};
use tempfile::TempDir;

struct Unreachable;

#[async_trait]
impl Transport for Unreachable {
    async fn request(
        &self,
        _method: HttpMethod,
        _url: &str,
        _body: Option<&Value>,
    ) -> Result<Value, TransportError> {
        Err(TransportError::new(0, "connection refused"))
    }
}

async fn backend(dir: &TempDir, namespace: &str) -> Arc<dyn DurableBackend> {
    Arc::new(FileBackend::open(dir.path(), namespace).await.unwrap())
}

async fn open_cache(dir: &TempDir) -> CacheStore<Value> {
    CacheStore::open(&StoreConfig::default(), Some(backend(dir, "cache").await)).await
}

#[tokio::test]
async fn test_cache_survives_restart() {
    let dir = TempDir::new().unwrap();

    {
        let cache = open_cache(&dir).await;
        assert!(cache.is_persistent());
        cache.set("GET:/batches", json!([{"id": 1}]), None).unwrap();
        cache.set("GET:/users", json!({"name": "ada"}), None).unwrap();
        cache.flush().await;
    }

    let cache = open_cache(&dir).await;
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("GET:/batches").await, Some(json!([{"id": 1}])));
    assert_eq!(cache.get("GET:/users").await, Some(json!({"name": "ada"})));
}

#[tokio::test]
async fn test_expired_entries_are_not_rehydrated() {
    let dir = TempDir::new().unwrap();

    {
        let cache = open_cache(&dir).await;
        cache
            .set("short", json!("gone soon"), Some(Duration::from_millis(20)))
            .unwrap();
        cache.set("long", json!("still here"), None).unwrap();
        cache.flush().await;
    }

    tokio::time::sleep(Duration::from_millis(60)).await;

    {
        let cache = open_cache(&dir).await;
        assert!(!cache.contains("short"));
        assert!(cache.contains("long"));
        cache.flush().await;
    }

    // The expired record was deleted from disk during the reopen
    let records = backend(&dir, "cache").await.scan_all().await.unwrap();
    let keys: Vec<_> = records.into_iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec!["long".to_string()]);
}

#[tokio::test]
async fn test_clear_all_reaches_disk() {
    let dir = TempDir::new().unwrap();

    {
        let cache = open_cache(&dir).await;
        cache.set("a", json!(1), None).unwrap();
        cache.set("b", json!(2), None).unwrap();
        cache.clear_all();
        cache.set("c", json!(3), None).unwrap();
        cache.flush().await;
    }

    let cache = open_cache(&dir).await;
    assert!(!cache.contains("a"));
    assert!(!cache.contains("b"));
    assert_eq!(cache.get("c").await, Some(json!(3)));
}

#[tokio::test]
async fn test_queued_operations_survive_restart() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::default();

    {
        let queue = OfflineQueue::new(
            &config,
            Some(backend(&dir, "queue").await),
            Arc::new(Unreachable),
            Connectivity::new(true),
        );
        let outcome = queue
            .perform_request::<Value>(HttpMethod::Post, "/batches", Some(json!({"name": "X"})), None)
            .await
            .unwrap();
        assert!(outcome.is_queued());
    }

    let queue = OfflineQueue::new(
        &config,
        Some(backend(&dir, "queue").await),
        Arc::new(Unreachable),
        Connectivity::new(false),
    );
    let pending = queue.pending_operations().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].method, HttpMethod::Post);
    assert_eq!(pending[0].url, "/batches");
    assert_eq!(pending[0].body, Some(json!({"name": "X"})));
}

#[tokio::test]
async fn test_unusable_directory_degrades_to_memory_only() {
    let dir = TempDir::new().unwrap();
    let not_a_dir = dir.path().join("occupied");
    std::fs::write(&not_a_dir, b"file in the way").unwrap();

    let backend = open_or_degrade(&not_a_dir, "cache").await;
    assert!(backend.is_none());

    let cache: CacheStore<Value> = CacheStore::open(&StoreConfig::default(), backend).await;
    assert!(!cache.is_persistent());
    cache.set("k", json!("v"), None).unwrap();
    assert_eq!(cache.get("k").await, Some(json!("v")));
}

#[tokio::test]
async fn test_corrupt_document_degrades() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("cache.json"), b"{ not json").unwrap();

    assert!(open_or_degrade(dir.path(), "cache").await.is_none());
}

#[tokio::test]
async fn test_persistence_disabled_ignores_backend() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        persistent_storage: false,
        ..StoreConfig::default()
    };

    let cache: CacheStore<Value> = CacheStore::open(&config, Some(backend(&dir, "cache").await)).await;
    assert!(!cache.is_persistent());
}
