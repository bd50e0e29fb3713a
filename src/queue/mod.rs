//! Offline Queue Module
//!
//! Durable FIFO of mutations issued while the upstream was unreachable.

mod offline;
mod operation;

pub use offline::OfflineQueue;
pub use operation::{queued_ack, PendingOperation, QueuedRequest, RequestOutcome, SyncReport};
