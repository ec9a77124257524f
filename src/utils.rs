use std::future::pending;

use tokio::signal;
use tracing::{error, warn};

/// Wait for Ctrl+C or SIGTERM.
///
/// A signal whose handler cannot be installed is logged and never fires;
/// the other one still triggers shutdown.
pub async fn shutdown_signal() {
    tokio::select! {
        () = ctrl_c() => warn!("Received Ctrl+C, initiating graceful shutdown..."),
        () = terminate() => warn!("Received SIGTERM, initiating graceful shutdown..."),
    }
}

async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {e}");
        pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGTERM handler: {e}");
            pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    pending::<()>().await;
}
