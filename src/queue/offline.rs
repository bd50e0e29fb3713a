//! Offline Queue Module
//!
//! Sends mutations upstream when possible and parks them in a durable queue
//! when the network is not, replaying them in creation order later.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::{PendingOperation, QueuedRequest, RequestOutcome, SyncReport};
use crate::config::StoreConfig;
use crate::connectivity::Connectivity;
use crate::error::{Error, Result};
use crate::storage::{DurableBackend, StorageResult, TypedStore};
use crate::transport::{HttpMethod, Transport};

// == Offline Queue ==
pub struct OfflineQueue {
    /// `None` when persistence is disabled or the backend could not be opened
    store: Option<TypedStore<PendingOperation>>,
    transport: Arc<dyn Transport>,
    connectivity: Connectivity,
    max_retry_count: u32,
    sync_in_progress: AtomicBool,
}

/// Clears the in-progress flag on every exit path of a sync.
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl OfflineQueue {
    // == Constructor ==
    pub fn new(
        config: &StoreConfig,
        backend: Option<Arc<dyn DurableBackend>>,
        transport: Arc<dyn Transport>,
        connectivity: Connectivity,
    ) -> Self {
        let store = match backend {
            Some(backend) if config.persistent_storage => Some(TypedStore::new(backend)),
            _ => {
                warn!("Offline queue has no durable store; offline mutations will fail");
                None
            }
        };
        Self {
            store,
            transport,
            connectivity,
            max_retry_count: config.max_retry_count,
            sync_in_progress: AtomicBool::new(false),
        }
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    pub fn is_syncing(&self) -> bool {
        self.sync_in_progress.load(Ordering::Acquire)
    }

    // == Perform Request ==
    /// Issues a mutation, queueing it when the network is unavailable.
    ///
    /// Online, the call goes straight to the transport. A transient failure
    /// (status 0 or 504) or being offline queues the call and returns
    /// `RequestOutcome::Queued` carrying `optimistic`. Any other failure is
    /// returned unchanged and nothing is queued.
    ///
    /// When the upstream call succeeds but its response is not a valid `R`,
    /// the mutation has already been applied: the error is
    /// `Error::UnexpectedResponse` carrying the raw response, and the call
    /// must not be retried as if it had failed.
    pub async fn perform_request<R>(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<Value>,
        optimistic: Option<R>,
    ) -> Result<RequestOutcome<R>>
    where
        R: DeserializeOwned,
    {
        if self.is_online() {
            match self.transport.request(method, url, body.as_ref()).await {
                Ok(response) => {
                    return match serde_json::from_value(response.clone()) {
                        Ok(decoded) => Ok(RequestOutcome::Completed(decoded)),
                        Err(source) => {
                            warn!(
                                "{} {} applied but its response did not decode: {}",
                                method, url, source
                            );
                            Err(Error::UnexpectedResponse { response, source })
                        }
                    };
                }
                Err(err) if err.is_transient() && self.store.is_some() => {
                    warn!("{} {} failed transiently ({}), queueing", method, url, err.status);
                }
                Err(err) => return Err(err.into()),
            }
        }

        let operation = PendingOperation::new(method, url, body);
        let operation_id = operation.id.clone();
        self.enqueue(operation).await?;

        Ok(RequestOutcome::Queued(QueuedRequest {
            operation_id,
            optimistic,
        }))
    }

    /// Persists `operation` for later replay.
    pub async fn enqueue(&self, operation: PendingOperation) -> Result<()> {
        let store = self.store.as_ref().ok_or(Error::OfflineUnavailable)?;
        store.put(&operation.id, &operation).await?;
        info!(
            "Queued {} {} as operation {}",
            operation.method, operation.url, operation.id
        );
        Ok(())
    }

    // == Inspection ==
    /// All queued operations in replay order.
    pub async fn pending_operations(&self) -> Result<Vec<PendingOperation>> {
        let Some(store) = &self.store else {
            return Ok(Vec::new());
        };
        Ok(load_operations(store).await?)
    }

    /// Number of queued operations; 0 when the queue cannot be read.
    pub async fn pending_operation_count(&self) -> usize {
        match self.pending_operations().await {
            Ok(operations) => operations.len(),
            Err(err) => {
                warn!("Could not count pending operations: {}", err);
                0
            }
        }
    }

    // == Sync ==
    /// Replays every queued operation, one at a time, oldest first.
    ///
    /// Returns `None` without doing anything when there is no durable store,
    /// the client is offline, or another sync is already running.
    pub async fn sync_pending_operations(&self) -> Option<SyncReport> {
        let store = self.store.as_ref()?;
        if !self.is_online() {
            debug!("Skipping sync while offline");
            return None;
        }
        if self
            .sync_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Sync already in progress");
            return None;
        }
        let _guard = SyncGuard(&self.sync_in_progress);

        let operations = match load_operations(store).await {
            Ok(operations) => operations,
            Err(err) => {
                error!("Could not load pending operations: {}", err);
                return None;
            }
        };
        if operations.is_empty() {
            return Some(SyncReport::default());
        }
        info!("Replaying {} pending operations", operations.len());

        let mut report = SyncReport::default();
        for mut operation in operations {
            report.attempted += 1;
            let result = self
                .transport
                .request(operation.method, &operation.url, operation.body.as_ref())
                .await;

            match result {
                Ok(_) => {
                    debug!("Operation {} replayed", operation.id);
                    report.succeeded += 1;
                    if let Err(err) = store.delete(&operation.id).await {
                        warn!("Could not remove replayed operation {}: {}", operation.id, err);
                    }
                }
                Err(err) if operation.retry_count < self.max_retry_count => {
                    operation.retry_count += 1;
                    warn!(
                        "Operation {} failed ({}), attempt {} of {}",
                        operation.id,
                        err,
                        operation.retry_count,
                        self.max_retry_count + 1
                    );
                    report.retried += 1;
                    if let Err(err) = store.put(&operation.id, &operation).await {
                        warn!("Could not update operation {}: {}", operation.id, err);
                    }
                }
                Err(err) => {
                    // Dropped for good; nothing else records this mutation
                    warn!(
                        "Dropping operation {} ({} {}) after {} retries: {}",
                        operation.id, operation.method, operation.url, operation.retry_count, err
                    );
                    report.dropped += 1;
                    if let Err(err) = store.delete(&operation.id).await {
                        warn!("Could not remove exhausted operation {}: {}", operation.id, err);
                    }
                }
            }
        }

        info!(
            "Sync finished: {} succeeded, {} will retry, {} dropped",
            report.succeeded, report.retried, report.dropped
        );
        Some(report)
    }
}

/// Decodable operations in replay order. Records that no longer decode are
/// deleted so they cannot hold up the rest of the queue.
async fn load_operations(
    store: &TypedStore<PendingOperation>,
) -> StorageResult<Vec<PendingOperation>> {
    let scan = store.scan_all().await?;
    for key in &scan.undecodable {
        warn!("Discarding undecodable queued operation '{}'", key);
        if let Err(err) = store.delete(key).await {
            warn!("Could not remove undecodable operation '{}': {}", key, err);
        }
    }
    let mut operations = scan.records;
    operations.sort_by(PendingOperation::replay_order);
    Ok(operations)
}
