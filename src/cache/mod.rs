//! Cache Module
//!
//! Tiered caching with TTL expiration and size-bounded, age-ordered eviction.

mod durable;
mod entry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use entry::{current_timestamp_ms, estimate_size, CacheEntry};
pub use stats::CacheStats;
pub use store::CacheStore;
