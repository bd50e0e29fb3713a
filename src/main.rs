//! Resilient Cache - a local offline-first proxy
//!
//! Caches upstream reads and queues upstream writes while offline.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resilient_cache::api::{create_router, AppState};
use resilient_cache::storage::open_or_degrade;
use resilient_cache::transport::{HttpTransport, Transport};
use resilient_cache::{
    spawn_cleanup_task, spawn_probe_task, spawn_sync_task, CacheStore, Config, Connectivity,
    OfflineQueue,
};

/// Main entry point for the proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open durable stores, degrading to memory-only on failure
/// 4. Build the cache and the offline queue
/// 5. Start the expiry sweep, connectivity probe and replay trigger
/// 6. Serve HTTP until SIGINT/SIGTERM, then flush the cache
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resilient_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resilient Cache proxy");

    let config = Config::from_env();
    info!(
        "Configuration loaded: upstream={}, default_ttl={:?}, max_cache_size={}, persistent={}, port={}",
        config.upstream_url,
        config.store.default_ttl,
        config.store.max_cache_size,
        config.store.persistent_storage,
        config.server_port
    );

    let (cache_backend, queue_backend) = if config.store.persistent_storage {
        (
            open_or_degrade(&config.data_dir, "cache").await,
            open_or_degrade(&config.data_dir, "queue").await,
        )
    } else {
        (None, None)
    };

    let transport: Arc<dyn Transport> = Arc::new(
        HttpTransport::new(
            config.upstream_url.clone(),
            Duration::from_secs(config.request_timeout),
        )
        .context("Failed to build upstream client")?,
    );
    let connectivity = Connectivity::new(true);

    let cache = Arc::new(CacheStore::open(&config.store, cache_backend).await);
    info!("Cache store initialized with {} entries", cache.len());

    let queue = Arc::new(OfflineQueue::new(
        &config.store,
        queue_backend,
        transport.clone(),
        connectivity.clone(),
    ));
    info!(
        "Offline queue initialized with {} pending operations (persistent={})",
        queue.pending_operation_count().await,
        queue.is_persistent()
    );

    let mut handles = Vec::new();
    if config.cleanup_interval > 0 {
        handles.push(spawn_cleanup_task(cache.clone(), config.cleanup_interval));
    }
    handles.push(spawn_probe_task(
        connectivity,
        transport.clone(),
        config.health_path.clone(),
        config.probe_interval,
    ));
    handles.push(spawn_sync_task(queue.clone()));
    info!("Background tasks started");

    let app = create_router(AppState::new(cache.clone(), queue, transport));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(handles))
        .await
        .context("Server error")?;

    cache.flush().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the background tasks.
async fn shutdown_signal(handles: Vec<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    for handle in &handles {
        handle.abort();
    }
    warn!("Background tasks aborted");
}
