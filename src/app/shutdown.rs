use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal as unix_signal};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

/// Resolves on SIGINT or SIGTERM. If no listener can be installed this
/// never resolves and the process runs until its input closes.
#[cfg(unix)]
pub async fn wait_for_signal() -> ShutdownSignal {
    let mut sigterm = match unix_signal(SignalKind::terminate()) {
        Ok(sigterm) => Some(sigterm),
        Err(e) => {
            error!("Failed to create SIGTERM handler: {}", e);
            None
        }
    };

    let terminate = async {
        match sigterm.as_mut() {
            Some(sigterm) => sigterm.recv().await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = signal::ctrl_c() => on_ctrl_c(result).await,
        Some(()) = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
            ShutdownSignal::Terminate
        }
    }
}

#[cfg(not(unix))]
pub async fn wait_for_signal() -> ShutdownSignal {
    on_ctrl_c(signal::ctrl_c().await).await
}

async fn on_ctrl_c(result: std::io::Result<()>) -> ShutdownSignal {
    match result {
        Ok(()) => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
            ShutdownSignal::Interrupt
        }
        Err(err) => {
            error!("Failed to listen for SIGINT: {}", err);
            std::future::pending().await
        }
    }
}
