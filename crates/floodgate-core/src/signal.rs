//! Signal handling for graceful shutdown.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wait for a shutdown signal (SIGINT, SIGTERM, or SIGQUIT on Unix).
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let handlers = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::quit()),
    );

    let (Ok(mut sigint), Ok(mut sigterm), Ok(mut sigquit)) = handlers else {
        warn!("Failed to install Unix signal handlers, falling back to Ctrl-C");
        if tokio::signal::ctrl_c().await.is_ok() {
            info!(message = "Signal received.", signal = "ctrl_c");
        }
        return;
    };

    tokio::select! {
        _ = sigint.recv() => {
            info!(message = "Signal received.", signal = "SIGINT");
        }
        _ = sigterm.recv() => {
            info!(message = "Signal received.", signal = "SIGTERM");
        }
        _ = sigquit.recv() => {
            info!(message = "Signal received.", signal = "SIGQUIT");
        }
    }
}

/// Wait for Ctrl-C on platforms without Unix signals.
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(message = "Signal received.", signal = "ctrl_c");
    }
}

/// Cancel `token` once a shutdown signal arrives.
///
/// The returned handle can be aborted when the job finishes first.
pub fn cancel_on_shutdown(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        token.cancel();
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_cancellation_propagates_through_clones() {
        let original = CancellationToken::new();
        let clone1 = original.clone();
        let clone2 = clone1.clone();

        assert!(!clone1.is_cancelled());
        assert!(!clone2.is_cancelled());

        original.cancel();

        assert!(clone1.is_cancelled());
        assert!(clone2.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_token_interrupts_sleep() {
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        let handle = tokio::spawn(async move {
            shutdown_clone
                .run_until_cancelled(tokio::time::sleep(Duration::from_secs(10)))
                .await
                .is_none()
        });

        shutdown.cancel();

        let interrupted = tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .expect("task should complete quickly")
            .expect("task should not panic");

        assert!(interrupted);
    }
}
