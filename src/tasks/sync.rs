//! Replay Trigger Task
//!
//! Runs `sync_pending_operations` once at startup when online, then again on
//! every offline → online transition.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::queue::OfflineQueue;

pub fn spawn_sync_task(queue: Arc<OfflineQueue>) -> JoinHandle<()> {
    // Subscribe before the startup pass so an edge during it is not missed
    let mut online_events = queue.connectivity().subscribe();

    tokio::spawn(async move {
        if queue.is_online() {
            run_sync(&queue, "startup").await;
        }

        while online_events.next().await.is_some() {
            run_sync(&queue, "reconnect").await;
        }
        debug!("Connectivity closed, replay trigger stopping");
    })
}

async fn run_sync(queue: &OfflineQueue, trigger: &str) {
    match queue.sync_pending_operations().await {
        Some(report) if report.attempted > 0 => {
            info!("Sync on {}: {:?}", trigger, report);
        }
        Some(_) => debug!("Sync on {}: queue empty", trigger),
        None => debug!("Sync on {} skipped", trigger),
    }
}
