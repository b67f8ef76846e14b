use tokio::sync::watch;
use tracing::info;

/// Owns the shutdown signal every scheduler and reporter listens on.
///
/// Receivers see `true` once [`ShutdownService::trigger`] has run. The flag
/// never goes back to `false`.
pub struct ShutdownService {
    tx: watch::Sender<bool>,
}

impl ShutdownService {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        if !*self.tx.borrow() {
            info!("Initiating graceful shutdown...");
        }
        // send_replace succeeds even with no live receivers
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for ShutdownService {
    fn default() -> Self {
        Self::new()
    }
}
