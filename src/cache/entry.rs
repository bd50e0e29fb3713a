//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::io;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

// == Cache Entry ==
/// A single cached value with its lifetime and footprint.
///
/// The same shape is written to the durable tier, so a record carries its own key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// Cache key, including any key-space prefix such as `batch_` or `doc_`
    pub key: String,
    /// The cached value
    pub data: T,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds), always after `created_at`
    pub expiry: u64,
    /// Length of `data` serialized as JSON
    pub approx_size_bytes: u64,
}

impl<T: Serialize> CacheEntry<T> {
    // == Constructor ==
    /// Creates an entry that expires `ttl` from now.
    ///
    /// A zero TTL is raised to one millisecond to keep `expiry > created_at`;
    /// a TTL past the end of the clock saturates to "never expires".
    pub fn new(key: String, data: T, ttl: Duration) -> serde_json::Result<Self> {
        let approx_size_bytes = estimate_size(&data)?;
        let created_at = current_timestamp_ms();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        Ok(Self {
            key,
            data,
            created_at,
            expiry: created_at.saturating_add(ttl_ms),
            approx_size_bytes,
        })
    }
}

impl<T> CacheEntry<T> {
    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is valid while `now < expiry`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expiry
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expiry.saturating_sub(current_timestamp_ms())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Serialized JSON length of `data`, without buffering the output.
///
/// This is the same encoding the durable tier stores, so the estimate tracks
/// what actually lands on disk.
pub fn estimate_size<T: Serialize + ?Sized>(data: &T) -> serde_json::Result<u64> {
    let mut counter = ByteCounter(0);
    serde_json::to_writer(&mut counter, data)?;
    Ok(counter.0)
}

struct ByteCounter(u64);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
