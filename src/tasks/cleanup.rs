//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries, so an
//! entry nobody reads again does not sit in either tier until restart.

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns a background task that periodically purges expired cache entries.
///
/// # Arguments
/// * `cache` - Shared cache store
/// * `cleanup_interval_secs` - Interval in seconds between sweeps
///
/// # Example
/// ```ignore
/// let cache = Arc::new(CacheStore::<Value>::memory_only(&StoreConfig::default()));
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), 60);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<T>(cache: Arc<CacheStore<T>>, cleanup_interval_secs: u64) -> JoinHandle<()>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    spawn_cleanup_every(cache, Duration::from_secs(cleanup_interval_secs))
}

fn spawn_cleanup_every<T>(cache: Arc<CacheStore<T>>, interval: Duration) -> JoinHandle<()>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!("Starting TTL cleanup task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_expired();
            if removed > 0 {
                info!("TTL cleanup: removed {} expired entries", removed);
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    fn cache() -> Arc<CacheStore<String>> {
        Arc::new(CacheStore::memory_only(&StoreConfig::default()))
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let cache = cache();
        cache
            .set("expire_soon", "value".to_string(), Some(Duration::from_millis(30)))
            .unwrap();

        let handle = spawn_cleanup_every(cache.clone(), Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(200)).await;

        // Gone without anyone reading it
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().misses, 0);

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let cache = cache();
        cache
            .set("long_lived", "value".to_string(), Some(Duration::from_secs(3600)))
            .unwrap();

        let handle = spawn_cleanup_every(cache.clone(), Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(cache.get("long_lived").await, Some("value".to_string()));

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(cache(), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
