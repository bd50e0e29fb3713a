//! Cache Store Module
//!
//! Two-tier read-through cache: an in-memory map in front of an optional
//! durable backend, with lazy TTL expiry and age-based eviction under a byte
//! budget.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use super::durable::DurableTier;
use super::entry::current_timestamp_ms;
use crate::cache::{CacheEntry, CacheStats};
use crate::config::StoreConfig;
use crate::error::Result;
use crate::storage::DurableBackend;

/// Eviction stops once the aggregate size is at or below this share of the budget.
const EVICTION_TARGET_PERCENT: u64 = 80;

type FlightMap = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

// == Cache Store ==
/// Tiered cache of `T` values keyed by string.
///
/// The in-memory tier is authoritative and updated synchronously; the durable
/// tier is a mirror written in the background and consulted on memory misses.
pub struct CacheStore<T> {
    inner: Mutex<MemoryTier<T>>,
    durable: Option<DurableTier>,
    default_ttl: Duration,
    max_cache_size: u64,
    single_flight: bool,
    flights: FlightMap,
}

struct Slot<T> {
    entry: CacheEntry<T>,
    /// Insertion order, breaks `created_at` ties during eviction
    seq: u64,
}

struct MemoryTier<T> {
    entries: HashMap<String, Slot<T>>,
    stats: CacheStats,
    total_size: u64,
    next_seq: u64,
    /// Bumped by every invalidation; a durable lookup that straddles one is discarded
    generation: u64,
}

impl<T> MemoryTier<T> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            total_size: 0,
            next_seq: 0,
            generation: 0,
        }
    }

    fn insert(&mut self, entry: CacheEntry<T>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.total_size += entry.approx_size_bytes;
        if let Some(old) = self.entries.insert(entry.key.clone(), Slot { entry, seq }) {
            self.total_size -= old.entry.approx_size_bytes;
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<T>> {
        let slot = self.entries.remove(key)?;
        self.total_size -= slot.entry.approx_size_bytes;
        Some(slot.entry)
    }

    fn remove_matching<F>(&mut self, mut predicate: F) -> Vec<String>
    where
        F: FnMut(&str, &CacheEntry<T>) -> bool,
    {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, slot)| predicate(key, &slot.entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &keys {
            self.remove(key);
        }
        keys
    }

    /// Evicts oldest-first until the size is back under the target.
    ///
    /// Returns the evicted keys in eviction order.
    fn enforce_size_limit(&mut self, max_cache_size: u64) -> Vec<String> {
        if self.total_size <= max_cache_size {
            return Vec::new();
        }

        let target = max_cache_size / 100 * EVICTION_TARGET_PERCENT
            + max_cache_size % 100 * EVICTION_TARGET_PERCENT / 100;
        let mut by_age: Vec<(u64, u64, String)> = self
            .entries
            .iter()
            .map(|(key, slot)| (slot.entry.created_at, slot.seq, key.clone()))
            .collect();
        by_age.sort_unstable();

        let mut evicted = Vec::new();
        for (_, _, key) in by_age {
            if self.total_size <= target {
                break;
            }
            self.remove(&key);
            self.stats.record_eviction();
            evicted.push(key);
        }
        evicted
    }

    fn refresh_stats(&mut self) {
        let footprint = self
            .entries
            .values()
            .map(|slot| (slot.entry.created_at, slot.entry.approx_size_bytes));
        self.stats.set_footprint(footprint);
    }
}

enum MemoryLookup<T> {
    Hit(T),
    Expired,
    Absent,
}

impl<T> CacheStore<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    // == Constructors ==
    /// Creates a store with no durable tier.
    pub fn memory_only(config: &StoreConfig) -> Self {
        Self {
            inner: Mutex::new(MemoryTier::new()),
            durable: None,
            default_ttl: config.default_ttl,
            max_cache_size: config.max_cache_size,
            single_flight: config.single_flight,
            flights: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a store over `backend` and rehydrates the in-memory tier from it.
    ///
    /// Runs memory-only when persistence is disabled in `config` or no backend
    /// is given. Expired durable records are deleted instead of loaded; records
    /// that fail to decode are deleted too.
    pub async fn open(config: &StoreConfig, backend: Option<Arc<dyn DurableBackend>>) -> Self {
        let mut store = Self::memory_only(config);
        let backend = match backend {
            Some(backend) if config.persistent_storage => backend,
            _ => {
                info!("Cache running memory-only");
                return store;
            }
        };

        let records = match backend.scan_all().await {
            Ok(records) => records,
            Err(err) => {
                warn!("Could not load durable cache, starting empty: {}", err);
                Vec::new()
            }
        };

        let (durable, _writer) = DurableTier::spawn(backend);
        let now = current_timestamp_ms();
        let mut loaded = 0usize;
        let mut discarded = 0usize;
        {
            let inner = store.inner.get_mut();
            // Oldest first so insertion order agrees with creation order
            let mut entries: Vec<CacheEntry<T>> = Vec::with_capacity(records.len());
            for (key, record) in records {
                match serde_json::from_value::<CacheEntry<T>>(record) {
                    Ok(entry) if !entry.is_expired_at(now) => entries.push(entry),
                    Ok(_) => {
                        durable.delete(key);
                        discarded += 1;
                    }
                    Err(err) => {
                        warn!("Discarding undecodable cache record '{}': {}", key, err);
                        durable.delete(key);
                        discarded += 1;
                    }
                }
            }
            entries.sort_by_key(|entry| entry.created_at);
            for entry in entries {
                inner.insert(entry);
                loaded += 1;
            }
            for key in inner.enforce_size_limit(store.max_cache_size) {
                durable.delete(key);
            }
            inner.refresh_stats();
        }
        info!(
            "Cache rehydrated: {} entries loaded, {} expired or invalid discarded",
            loaded, discarded
        );

        store.durable = Some(durable);
        store
    }

    // == Get ==
    /// Returns the live value for `key`, or `None` on a miss.
    ///
    /// Durable-tier failures degrade to a miss.
    pub async fn get(&self, key: &str) -> Option<T> {
        let now = current_timestamp_ms();
        let (lookup, generation) = {
            let mut inner = self.inner.lock();
            let lookup = match inner.entries.get(key) {
                Some(slot) if !slot.entry.is_expired_at(now) => {
                    MemoryLookup::Hit(slot.entry.data.clone())
                }
                Some(_) => MemoryLookup::Expired,
                None => MemoryLookup::Absent,
            };
            match &lookup {
                MemoryLookup::Hit(_) => inner.stats.record_hit(),
                MemoryLookup::Expired => {
                    inner.remove(key);
                    inner.stats.record_miss();
                    inner.refresh_stats();
                }
                MemoryLookup::Absent => {}
            }
            (lookup, inner.generation)
        };

        match lookup {
            MemoryLookup::Hit(data) => return Some(data),
            MemoryLookup::Expired => {
                debug!("Cache entry '{}' expired", key);
                if let Some(durable) = &self.durable {
                    durable.delete(key.to_string());
                }
                return None;
            }
            MemoryLookup::Absent => {}
        }

        let Some(durable) = &self.durable else {
            self.inner.lock().stats.record_miss();
            return None;
        };

        let entry = match durable.get(key).await {
            Ok(Some(record)) => match serde_json::from_value::<CacheEntry<T>>(record) {
                Ok(entry) if !entry.is_expired() => Some(entry),
                Ok(_) => {
                    durable.delete(key.to_string());
                    None
                }
                Err(err) => {
                    warn!("Discarding undecodable cache record '{}': {}", key, err);
                    durable.delete(key.to_string());
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!("Durable cache lookup for '{}' failed: {}", key, err);
                None
            }
        };

        let mut inner = self.inner.lock();
        let Some(entry) = entry else {
            inner.stats.record_miss();
            return None;
        };
        if inner.generation != generation {
            debug!("Discarding durable read of '{}' that raced an invalidation", key);
            inner.stats.record_miss();
            return None;
        }

        inner.stats.record_hit();
        let data = entry.data.clone();
        // A concurrent set may have landed while the durable lookup was pending
        if !inner.entries.contains_key(key) {
            inner.insert(entry);
            let evicted = inner.enforce_size_limit(self.max_cache_size);
            inner.refresh_stats();
            drop(inner);
            for key in evicted {
                durable.delete(key);
            }
        }
        Some(data)
    }

    // == Set ==
    /// Stores `data` under `key` for `ttl` (or the default TTL).
    ///
    /// The in-memory write is visible as soon as this returns; the durable
    /// mirror is written in the background. Fails only when `data` cannot be
    /// serialized.
    pub fn set(&self, key: impl Into<String>, data: T, ttl: Option<Duration>) -> Result<()> {
        let key = key.into();
        let entry = CacheEntry::new(key.clone(), data, ttl.unwrap_or(self.default_ttl))?;
        let record = match &self.durable {
            Some(_) => Some(serde_json::to_value(&entry)?),
            None => None,
        };

        let evicted = {
            let mut inner = self.inner.lock();
            inner.insert(entry);
            let evicted = inner.enforce_size_limit(self.max_cache_size);
            inner.refresh_stats();
            evicted
        };

        if !evicted.is_empty() {
            debug!("Evicted {} cache entries to fit the size budget", evicted.len());
        }

        if let (Some(durable), Some(record)) = (&self.durable, record) {
            if !evicted.contains(&key) {
                durable.put(key, record);
            }
            for key in evicted {
                durable.delete(key);
            }
        }
        Ok(())
    }

    // == Invalidation ==
    /// Removes `key` from both tiers. Returns whether it was in memory.
    pub fn clear(&self, key: &str) -> bool {
        let removed = {
            let mut inner = self.inner.lock();
            let removed = inner.remove(key).is_some();
            inner.generation += 1;
            inner.refresh_stats();
            removed
        };
        if let Some(durable) = &self.durable {
            durable.delete(key.to_string());
        }
        removed
    }

    /// Removes every key starting with `prefix` from both tiers.
    ///
    /// Returns how many in-memory entries were removed.
    pub fn clear_by_prefix(&self, prefix: &str) -> usize {
        let removed = {
            let mut inner = self.inner.lock();
            let removed = inner.remove_matching(|key, _| key.starts_with(prefix));
            inner.generation += 1;
            inner.refresh_stats();
            removed.len()
        };
        if let Some(durable) = &self.durable {
            durable.delete_prefix(prefix.to_string());
        }
        debug!("Cleared {} cache entries with prefix '{}'", removed, prefix);
        removed
    }

    /// Empties both tiers.
    pub fn clear_all(&self) {
        {
            let mut inner = self.inner.lock();
            inner.entries.clear();
            inner.total_size = 0;
            inner.generation += 1;
            inner.refresh_stats();
        }
        if let Some(durable) = &self.durable {
            durable.clear();
        }
    }

    // == Cleanup Expired ==
    /// Removes every expired in-memory entry from both tiers.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let expired = {
            let mut inner = self.inner.lock();
            let expired = inner.remove_matching(|_, entry| entry.is_expired_at(now));
            inner.refresh_stats();
            expired
        };
        let count = expired.len();
        if let Some(durable) = &self.durable {
            for key in expired {
                durable.delete(key);
            }
        }
        count
    }

    // == Cache Wrap ==
    /// Returns the cached value for `key`, or runs `producer` and caches its result.
    ///
    /// Producer errors are returned as-is and nothing is cached. Without
    /// single-flight, concurrent misses on the same key each run the producer
    /// and the last one to finish wins.
    pub async fn cache_wrap<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let _flight = if self.single_flight {
            Some(Flight::acquire(&self.flights, key).await)
        } else {
            None
        };

        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }

        let data = producer().await?;
        if let Err(err) = self.set(key, data.clone(), ttl) {
            warn!("Could not cache result for '{}': {}", key, err);
        }
        Ok(data)
    }

    // == Inspection ==
    /// Returns a snapshot of the statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }

    /// Whether a live entry for `key` is in memory. Does not touch the stats.
    pub fn contains(&self, key: &str) -> bool {
        let now = current_timestamp_ms();
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|slot| !slot.entry.is_expired_at(now))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn is_persistent(&self) -> bool {
        self.durable.is_some()
    }

    /// Waits until every durable write issued so far has been applied.
    pub async fn flush(&self) {
        if let Some(durable) = &self.durable {
            durable.flush().await;
        }
    }
}

// == Single Flight ==
/// Per-key lock held for the duration of one `cache_wrap`.
///
/// The map entry is dropped with the last holder so the map does not grow
/// with every key ever wrapped.
struct Flight<'a> {
    flights: &'a FlightMap,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<'a> Flight<'a> {
    async fn acquire(flights: &'a FlightMap, key: &str) -> Flight<'a> {
        let lock = flights.lock().entry(key.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;
        Flight {
            flights,
            key: key.to_string(),
            guard: Some(guard),
        }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut flights = self.flights.lock();
        if flights
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            flights.remove(&self.key);
        }
    }
}
