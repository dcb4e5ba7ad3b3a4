//! Shutdown signal handling.
//!
//! SIGINT and SIGTERM both request a graceful shutdown. On non-Unix targets
//! only Ctrl-C is observed.

use std::io;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Wait for SIGTERM or SIGINT.
#[cfg(unix)]
pub async fn wait_for_shutdown() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }
    Ok(())
}

/// Wait for Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown() -> io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");
    Ok(())
}

/// Cancel `token` when a shutdown signal arrives.
///
/// The returned task ends early if the token is cancelled some other way.
pub fn cancel_on_signal(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            result = wait_for_shutdown() => {
                if let Err(e) = result {
                    error!("Failed to register signal handlers: {}", e);
                    return;
                }
                token.cancel();
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_on_signal_exits_when_token_cancelled() {
        let token = CancellationToken::new();
        let handle = cancel_on_signal(token.clone());

        token.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_wait_for_shutdown_pending_without_signal() {
        let result = tokio::time::timeout(Duration::from_millis(50), wait_for_shutdown()).await;
        assert!(result.is_err());
    }
}
