use std::sync::Arc;

use anyhow::{Context, Result};
use calendar_broker::BrokerConfig;
use calendar_core::shutdown::{wait_for_signal, SHUTDOWN_TIMEOUT};
use calendar_core::telemetry::{init_telemetry, TelemetryConfig};
use calendar_core::StorageConfig;
use calendar_sender::SenderService;

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; real environment wins
    dotenvy::dotenv().ok();

    // Configure via environment variables:
    // - RUST_LOG or LOG_LEVEL: Log filter (default: "calendar_sender=debug,calendar_broker=info")
    let mut telemetry_config = TelemetryConfig::from_env("calendar-sender");
    if telemetry_config.log_filter.is_none() {
        telemetry_config.log_filter = Some("calendar_sender=debug,calendar_broker=info".to_string());
    }
    init_telemetry(telemetry_config);

    tracing::info!("calendar-sender starting...");

    let storage = StorageConfig::from_env().context("Invalid storage configuration")?;
    let broker = BrokerConfig::from_env();

    tracing::info!(
        storage = %storage.kind,
        amqp = %broker.redacted_uri(),
        queue = %broker.queue,
        "Configuration loaded"
    );

    let service = Arc::new(SenderService::new());
    let mut consumer = {
        let service = service.clone();
        tokio::spawn(async move { service.run(&storage, broker).await })
    };

    tokio::select! {
        result = &mut consumer => {
            // Consumption ended on its own: connection failure or broker closed the stream
            result
                .context("Sender task panicked")?
                .context("Sender failed")?;
            tracing::info!("Delivery stream closed");
        }
        _ = wait_for_signal() => {
            service.stop().await;
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, consumer).await {
                Ok(Ok(Err(e))) => tracing::error!(error = %e, "Sender error during shutdown"),
                Ok(Err(e)) => tracing::error!(error = %e, "Sender task panicked"),
                Err(_) => tracing::warn!("Sender did not stop in time"),
                Ok(Ok(Ok(()))) => {}
            }
        }
    }

    tracing::info!("Sender shutdown complete");
    Ok(())
}
