//! Response DTOs for the proxy API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::queue::SyncReport;

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entry_count: usize,
    pub total_size: u64,
    pub oldest_entry: Option<u64>,
    pub newest_entry: Option<u64>,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Operations waiting for replay
    pub pending_operations: usize,
    pub online: bool,
    pub syncing: bool,
}

impl StatsResponse {
    pub fn new(stats: CacheStats, pending_operations: usize, online: bool, syncing: bool) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            entry_count: stats.entry_count,
            total_size: stats.total_size,
            oldest_entry: stats.oldest_entry,
            newest_entry: stats.newest_entry,
            pending_operations,
            online,
            syncing,
        }
    }
}

/// Response body for POST /sync
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    /// "completed" or "skipped"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SyncReport>,
}

impl SyncResponse {
    pub fn new(report: Option<SyncReport>) -> Self {
        let status = if report.is_some() { "completed" } else { "skipped" };
        Self {
            status: status.to_string(),
            report,
        }
    }
}

/// Response body for the DELETE /cache endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    /// In-memory entries removed, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<usize>,
}

impl ClearResponse {
    pub fn new(message: impl Into<String>, removed: Option<usize>) -> Self {
        Self {
            message: message.into(),
            removed,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
