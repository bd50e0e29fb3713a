//! Connectivity Module
//!
//! A shared online/offline flag with edge-triggered "became online" events.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

// == Connectivity ==
/// Cloneable handle to the process-wide online flag.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Updates the flag. Subscribers are only woken on an actual change.
    ///
    /// Returns true when the value changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            info!("Connectivity changed: {}", if online { "online" } else { "offline" });
        }
        changed
    }

    /// Subscribes to offline → online transitions from this point on.
    pub fn subscribe(&self) -> OnlineEvents {
        OnlineEvents {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

// == Online Events ==
/// Stream of "became online" edges.
pub struct OnlineEvents {
    rx: watch::Receiver<bool>,
}

impl OnlineEvents {
    /// Waits for the next transition to online.
    ///
    /// A flap that goes offline and back before this is polled is reported
    /// once. Returns `None` once every `Connectivity` handle is gone.
    pub async fn next(&mut self) -> Option<()> {
        loop {
            self.rx.changed().await.ok()?;
            if *self.rx.borrow_and_update() {
                return Some(());
            }
        }
    }
}
