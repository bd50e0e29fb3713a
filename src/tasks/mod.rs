//! Background Tasks Module
//!
//! Long-running tasks spawned alongside the data layer. Each returns its
//! `JoinHandle` so it can be aborted during shutdown.
//!
//! # Tasks
//! - Expiry sweep: removes expired cache entries at a fixed interval
//! - Replay trigger: syncs the offline queue at startup and on reconnect
//! - Connectivity probe: derives the online flag from upstream health checks

mod cleanup;
mod probe;
mod sync;

pub use cleanup::spawn_cleanup_task;
pub use probe::{probe_once, spawn_probe_task};
pub use sync::spawn_sync_task;
