//! Shutdown coordination.
//!
//! SIGTERM and SIGINT, a `Shutdown` request, or the daemon itself can trigger
//! shutdown; every waiter observes it through one watch channel.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Clonable trigger and observer of shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once shutdown has been triggered.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // a closed channel means nobody can trigger any more
        let _ = rx.wait_for(|shutdown| *shutdown).await;
    }

    /// Triggers shutdown on SIGTERM or SIGINT.
    #[cfg(unix)]
    pub fn listen_for_signals(&self) {
        use tokio::signal::unix::{SignalKind, signal};

        let handle = self.clone();
        tokio::spawn(async move {
            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!(error = %e, "Failed to install signal handlers");
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown"),
                _ = sigint.recv() => info!("Received SIGINT, initiating shutdown"),
                _ = handle.wait() => {
                    debug!("Signal listener stopped");
                    return;
                }
            }
            handle.trigger();
        });
    }

    #[cfg(not(unix))]
    pub fn listen_for_signals(&self) {
        let handle = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, initiating shutdown");
                handle.trigger();
            }
        });
    }
}
