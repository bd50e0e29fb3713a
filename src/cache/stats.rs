//! Cache Statistics Module
//!
//! Tracks hits, misses and evictions, plus a footprint snapshot of the
//! in-memory tier.

use serde::Serialize;

// == Cache Stats ==
/// Cache performance metrics and footprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (absent or expired)
    pub misses: u64,
    /// Number of entries evicted by the size budget
    pub evictions: u64,
    /// Current number of in-memory entries
    pub entry_count: usize,
    /// Sum of `approx_size_bytes` over all in-memory entries
    pub total_size: u64,
    /// `created_at` of the oldest entry (Unix milliseconds)
    pub oldest_entry: Option<u64>,
    /// `created_at` of the newest entry (Unix milliseconds)
    pub newest_entry: Option<u64>,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Footprint ==
    /// Replaces the footprint fields from a pass over `(created_at, size)` pairs.
    pub fn set_footprint<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (u64, u64)>,
    {
        self.entry_count = 0;
        self.total_size = 0;
        self.oldest_entry = None;
        self.newest_entry = None;

        for (created_at, size) in entries {
            self.entry_count += 1;
            self.total_size += size;
            self.oldest_entry = Some(self.oldest_entry.map_or(created_at, |t| t.min(created_at)));
            self.newest_entry = Some(self.newest_entry.map_or(created_at, |t| t.max(created_at)));
        }
    }
}
