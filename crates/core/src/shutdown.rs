// Process shutdown helpers shared by the service binaries

use std::future::Future;
use std::time::Duration;

/// Budget for a graceful stop. Shutdown proceeds once it elapses.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

/// Resolve on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Await `fut` for at most `SHUTDOWN_TIMEOUT`.
///
/// Returns `None` and logs a warning naming `what` when the budget runs out;
/// the future is dropped at that point.
pub async fn bounded<F: Future>(what: &str, fut: F) -> Option<F::Output> {
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, fut).await {
        Ok(output) => Some(output),
        Err(_) => {
            tracing::warn!(
                timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                "{} did not finish in time, continuing shutdown",
                what
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_returns_output_in_time() {
        let output = bounded("quick close", async { 7 }).await;
        assert_eq!(output, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_gives_up_on_stalled_future() {
        let started = tokio::time::Instant::now();
        let output = bounded("stalled close", std::future::pending::<()>()).await;
        assert!(output.is_none());
        assert!(started.elapsed() >= SHUTDOWN_TIMEOUT);
    }
}
