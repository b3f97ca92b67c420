//! Shutdown signal handling.
//!
//! Bridges SIGINT/SIGTERM to a [`CancellationToken`] so the daemon loop can
//! stop between firings.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Signals that request shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Ctrl-C / SIGINT
    Interrupt,
    /// SIGTERM
    Terminate,
}

/// Wait for the next shutdown signal
pub async fn wait_for_shutdown() -> ShutdownSignal {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => return ShutdownSignal::Interrupt,
                    _ = sigterm.recv() => return ShutdownSignal::Terminate,
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler, listening for Ctrl-C only");
            }
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    ShutdownSignal::Interrupt
}

/// Spawn a listener that cancels the returned token on the first signal
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    debug!("Installing shutdown signal listener");
    tokio::spawn(async move {
        let signal = wait_for_shutdown().await;
        info!(signal = ?signal, "Received shutdown signal");
        trigger.cancel();
    });

    token
}
