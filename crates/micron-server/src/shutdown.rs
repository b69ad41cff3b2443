//! Graceful shutdown signal.
//!
//! ```rust
//! use micron_server::ShutdownSignal;
//!
//! # tokio_test::block_on(async {
//! let shutdown = ShutdownSignal::new();
//! let waiter = shutdown.clone();
//!
//! shutdown.trigger();
//! waiter.recv().await;
//! assert!(waiter.is_shutdown());
//! # });
//! ```

use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable signal to trigger and await shutdown.
///
/// Backed by a `watch` channel: every clone observes the same flag, and
/// a waiter that subscribes after the trigger completes immediately.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Triggers shutdown for every clone of this signal.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    /// Returns true once shutdown was triggered.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        *self.sender.borrow()
    }

    /// Completes when shutdown is triggered.
    pub async fn recv(&self) {
        let mut receiver = self.sender.subscribe();
        // Err means every sender is gone, which can only happen once
        // the signal itself is dropped.
        let _ = receiver.wait_for(|triggered| *triggered).await;
    }

    /// Creates a signal triggered by SIGINT (Ctrl+C), or SIGTERM on Unix.
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn with_os_signals() -> Self {
        let signal = Self::new();
        let trigger = signal.clone();

        tokio::spawn(async move {
            match wait_for_os_signal().await {
                Ok(()) => trigger.trigger(),
                Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signals"),
            }
        });

        signal
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_os_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown");
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Received SIGINT, initiating graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C, initiating graceful shutdown");
    }

    Ok(())
}
