use anyhow::{Context, Result};
use calendar_broker::BrokerConfig;
use calendar_core::shutdown::wait_for_signal;
use calendar_core::telemetry::{init_telemetry, TelemetryConfig};
use calendar_core::StorageConfig;
use calendar_scheduler::{SchedulerConfig, SchedulerService};

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; real environment wins
    dotenvy::dotenv().ok();

    // Configure via environment variables:
    // - RUST_LOG or LOG_LEVEL: Log filter (default: "calendar_scheduler=debug,calendar_broker=info")
    let mut telemetry_config = TelemetryConfig::from_env("calendar-scheduler");
    if telemetry_config.log_filter.is_none() {
        telemetry_config.log_filter =
            Some("calendar_scheduler=debug,calendar_broker=info".to_string());
    }
    init_telemetry(telemetry_config);

    tracing::info!("calendar-scheduler starting...");

    let storage = StorageConfig::from_env().context("Invalid storage configuration")?;
    let broker = BrokerConfig::from_env();
    let config = SchedulerConfig::from_env();

    tracing::info!(
        storage = %storage.kind,
        amqp = %broker.redacted_uri(),
        exchange = %broker.exchange,
        scan_interval_secs = config.scan_interval.as_secs(),
        "Configuration loaded"
    );

    let service = SchedulerService::new(config);
    service
        .start(&storage, broker)
        .await
        .context("Failed to start scheduler")?;

    wait_for_signal().await;

    service.stop().await;
    tracing::info!("Scheduler shutdown complete");
    Ok(())
}
