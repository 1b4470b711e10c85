// src/serve/reload.rs

use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the reload broadcast channel. Clients that lag simply miss
/// intermediate signals, which is harmless for "refresh now" semantics.
const RELOAD_CHANNEL_CAPACITY: usize = 16;

/// Cloneable handle to the live-reload push channel.
///
/// The runtime holds one clone and calls [`notify`](Self::notify) after each
/// fully successful run; every connected SSE client holds a subscription.
#[derive(Debug, Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<()>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(RELOAD_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Signal all connected clients to reload.
    ///
    /// No connected clients is not an error.
    pub fn notify(&self) {
        let receivers = self.tx.send(()).unwrap_or(0);
        debug!(receivers, "reload signal sent");
    }

    /// Subscribe to reload signals.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}
