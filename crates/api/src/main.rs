// Calendar API server
//
// Decision: gRPC and HTTP run side by side in one process over one event store
// Decision: Migrations run only when asked (`serve --migrate` or `migrate`)

use std::future::IntoFuture;

use anyhow::{Context, Result};
use calendar_api::openapi::ApiDoc;
use calendar_api::{build_router, ApiConfig, EventServiceImpl};
use calendar_core::shutdown::{bounded, wait_for_signal};
use calendar_core::telemetry::{init_telemetry, TelemetryConfig};
use calendar_core::{StorageBackend, StorageConfig};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

#[derive(Parser)]
#[command(name = "calendar-api", version, about = "Calendar event API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve gRPC and HTTP (default)
    Serve {
        /// Apply database migrations before serving
        #[arg(long, env = "RUN_MIGRATIONS")]
        migrate: bool,
    },
    /// Apply database migrations and exit
    Migrate,
    /// Print the OpenAPI document and exit
    Openapi,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine; real environment wins
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve { migrate: false });

    if let Command::Openapi = command {
        println!("{}", ApiDoc::to_json().context("Failed to render OpenAPI document")?);
        return Ok(());
    }

    // Configure via environment variables:
    // - RUST_LOG or LOG_LEVEL: Log filter (default: "calendar_api=debug,tower_http=debug")
    let mut telemetry_config = TelemetryConfig::from_env("calendar-api");
    if telemetry_config.log_filter.is_none() {
        telemetry_config.log_filter = Some("calendar_api=debug,tower_http=debug".to_string());
    }
    init_telemetry(telemetry_config);

    let storage = StorageConfig::from_env().context("Invalid storage configuration")?;
    let backend = StorageBackend::from_config(&storage)
        .await
        .context("Failed to open event store")?;

    match command {
        Command::Migrate => {
            backend.migrate().await.context("Failed to run migrations")?;
            tracing::info!("Migrations applied");
            bounded("Event store close", backend.store().close()).await;
            Ok(())
        }
        Command::Serve { migrate } => {
            if migrate {
                backend.migrate().await.context("Failed to run migrations")?;
                tracing::info!("Migrations applied");
            }
            serve(backend).await
        }
        Command::Openapi => Ok(()),
    }
}

async fn serve(backend: StorageBackend) -> Result<()> {
    let config = ApiConfig::from_env().context("Invalid listen address")?;
    if backend.is_dev_mode() {
        tracing::warn!("Using in-memory event store; data is lost on exit");
    }
    let store = backend.store();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let grpc_service = EventServiceImpl::new(store.clone());
    let grpc_addr = config.grpc_addr;
    let mut grpc_shutdown = shutdown_rx.clone();
    let grpc_task = tokio::spawn(async move {
        tracing::info!("gRPC server listening on {}", grpc_addr);
        tonic::transport::Server::builder()
            .layer(TraceLayer::new_for_grpc())
            .add_service(grpc_service.into_server())
            .serve_with_shutdown(grpc_addr, async move {
                let _ = grpc_shutdown.wait_for(|stop| *stop).await;
            })
            .await
    });

    let app = build_router(store.clone());
    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.http_addr))?;
    tracing::info!("HTTP server listening on {}", config.http_addr);

    let mut http_shutdown = shutdown_rx;
    let mut http_task = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = http_shutdown.wait_for(|stop| *stop).await;
            })
            .into_future(),
    );

    let http_result = tokio::select! {
        result = &mut http_task => Some(result),
        _ = wait_for_signal() => {
            tracing::info!("Shutdown signal received");
            None
        }
    };
    // Stored even when a server has already exited
    shutdown_tx.send_replace(true);

    let http_result = match http_result {
        Some(result) => Some(result),
        None => bounded("HTTP server", http_task).await,
    };
    match http_result {
        Some(Ok(Ok(()))) | None => {}
        Some(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server error"),
        Some(Err(e)) => tracing::error!(error = %e, "HTTP server task panicked"),
    }

    match bounded("gRPC server", grpc_task).await {
        Some(Ok(Ok(()))) | None => {}
        Some(Ok(Err(e))) => tracing::error!(error = %e, "gRPC server error"),
        Some(Err(e)) => tracing::error!(error = %e, "gRPC server task panicked"),
    }

    bounded("Event store close", store.close()).await;
    tracing::info!("API shutdown complete");
    Ok(())
}
