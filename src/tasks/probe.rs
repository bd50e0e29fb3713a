//! Connectivity Probe Task
//!
//! Outside a browser there is no platform online flag, so the flag is derived
//! from polling an upstream health path.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::connectivity::Connectivity;
use crate::transport::{HttpMethod, Transport};

/// One health check. Any response, even an error status, proves the network
/// path works; only transient failures count as offline.
pub async fn probe_once(transport: &dyn Transport, health_path: &str) -> bool {
    match transport.request(HttpMethod::Get, health_path, None).await {
        Ok(_) => true,
        Err(err) => !err.is_transient(),
    }
}

/// Probes immediately, then every `interval_secs`, updating `connectivity`.
pub fn spawn_probe_task(
    connectivity: Connectivity,
    transport: Arc<dyn Transport>,
    health_path: String,
    interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting connectivity probe on {} every {:?}",
            health_path, interval
        );

        loop {
            let online = probe_once(transport.as_ref(), &health_path).await;
            connectivity.set_online(online);
            tokio::time::sleep(interval).await;
        }
    })
}
