//! Durable Tier Writer
//!
//! All durable-tier traffic from a `CacheStore` goes through one background
//! task, applied in the order it was issued. Writes are fire-and-forget for
//! the caller; reads wait for their reply, which also means a read always
//! observes every write issued before it.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::storage::{DurableBackend, StorageResult};

enum Command {
    Put { key: String, record: Value },
    Delete { key: String },
    DeletePrefix { prefix: String },
    Clear,
    Get {
        key: String,
        reply: oneshot::Sender<StorageResult<Option<Value>>>,
    },
    Flush { reply: oneshot::Sender<()> },
}

/// Handle to the writer task. The task exits once every handle is dropped.
#[derive(Clone)]
pub(crate) struct DurableTier {
    tx: mpsc::UnboundedSender<Command>,
}

impl DurableTier {
    /// Spawns the writer task. Must be called inside a tokio runtime.
    pub fn spawn(backend: Arc<dyn DurableBackend>) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(backend, rx));
        (Self { tx }, handle)
    }

    pub fn put(&self, key: String, record: Value) {
        self.send(Command::Put { key, record });
    }

    pub fn delete(&self, key: String) {
        self.send(Command::Delete { key });
    }

    pub fn delete_prefix(&self, prefix: String) {
        self.send(Command::DeletePrefix { prefix });
    }

    pub fn clear(&self) {
        self.send(Command::Clear);
    }

    pub async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Get {
                key: key.to_string(),
                reply,
            })
            .map_err(|_| StorageError::Closed)?;
        rx.await.map_err(|_| StorageError::Closed)?
    }

    /// Resolves once every command sent before it has been applied.
    pub async fn flush(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Command::Flush { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            warn!("Durable tier writer has stopped; write dropped");
        }
    }
}

async fn run(backend: Arc<dyn DurableBackend>, mut rx: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Put { key, record } => {
                if let Err(err) = backend.put(&key, record).await {
                    warn!("Failed to persist cache entry '{}': {}", key, err);
                }
            }
            Command::Delete { key } => {
                if let Err(err) = backend.delete(&key).await {
                    warn!("Failed to delete cache entry '{}': {}", key, err);
                }
            }
            Command::DeletePrefix { prefix } => {
                if let Err(err) = delete_prefix(backend.as_ref(), &prefix).await {
                    warn!("Failed to delete cache entries with prefix '{}': {}", prefix, err);
                }
            }
            Command::Clear => {
                if let Err(err) = backend.clear().await {
                    warn!("Failed to clear durable cache: {}", err);
                }
            }
            Command::Get { key, reply } => {
                let _ = reply.send(backend.get(&key).await);
            }
            Command::Flush { reply } => {
                let _ = reply.send(());
            }
        }
    }
    debug!("Durable tier writer stopped");
}

async fn delete_prefix(backend: &dyn DurableBackend, prefix: &str) -> StorageResult<()> {
    for (key, _) in backend.scan_prefix(prefix).await? {
        backend.delete(&key).await?;
    }
    Ok(())
}
