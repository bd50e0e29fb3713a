//! Pending Operation Module
//!
//! A mutation waiting to be replayed upstream, and what `perform_request`
//! hands back to its caller.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::cache::current_timestamp_ms;
use crate::transport::HttpMethod;

// == Pending Operation ==
/// One queued mutation, stored under its `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Creation timestamp plus a random suffix
    pub id: String,
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<Value>,
    /// Creation time (Unix milliseconds); replay runs in ascending order
    pub timestamp: u64,
    /// Failed replays so far
    pub retry_count: u32,
}

impl PendingOperation {
    pub fn new(method: HttpMethod, url: impl Into<String>, body: Option<Value>) -> Self {
        let timestamp = next_timestamp();
        let suffix = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("{}-{}", timestamp, &suffix[..8]),
            url: url.into(),
            method,
            body,
            timestamp,
            retry_count: 0,
        }
    }

    /// Replay order: timestamp, then id for records from another process
    /// that happen to share a millisecond.
    pub fn replay_order(a: &Self, b: &Self) -> std::cmp::Ordering {
        a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id))
    }
}

/// Wall-clock milliseconds, bumped so that two operations created by this
/// process never share a timestamp.
fn next_timestamp() -> u64 {
    static LAST: AtomicU64 = AtomicU64::new(0);

    let now = current_timestamp_ms();
    let previous = LAST
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(now.max(last + 1)))
        .unwrap_or(now);
    now.max(previous + 1)
}

// == Request Outcome ==
/// Result of `OfflineQueue::perform_request`.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome<R> {
    /// The upstream call completed; this is its response
    Completed(R),
    /// The call was queued for replay
    Queued(QueuedRequest<R>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedRequest<R> {
    pub operation_id: String,
    pub optimistic: Option<R>,
}

impl<R> RequestOutcome<R> {
    pub fn is_queued(&self) -> bool {
        matches!(self, RequestOutcome::Queued(_))
    }

    pub fn operation_id(&self) -> Option<&str> {
        match self {
            RequestOutcome::Queued(queued) => Some(&queued.operation_id),
            RequestOutcome::Completed(_) => None,
        }
    }
}

impl RequestOutcome<Value> {
    /// Flattens to a single payload: the response, the optimistic response,
    /// or an acknowledgement carrying the operation id.
    pub fn into_value(self) -> Value {
        match self {
            RequestOutcome::Completed(value) => value,
            RequestOutcome::Queued(QueuedRequest {
                optimistic: Some(value),
                ..
            }) => value,
            RequestOutcome::Queued(QueuedRequest {
                operation_id,
                optimistic: None,
            }) => queued_ack(&operation_id),
        }
    }
}

/// Acknowledgement returned for a queued request with no optimistic response.
pub fn queued_ack(operation_id: &str) -> Value {
    json!({
        "success": true,
        "offline": true,
        "operationId": operation_id,
        "message": "Operation queued and will be sent when back online",
    })
}

// == Sync Report ==
/// Tally of one replay pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub succeeded: usize,
    /// Failed and kept for another attempt
    pub retried: usize,
    /// Failed with retries exhausted and removed
    pub dropped: usize,
}
