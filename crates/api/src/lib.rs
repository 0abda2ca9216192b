// Calendar API Library
// Decision: Shared library for the binary and tests (router, gRPC service, OpenAPI)

use std::sync::Arc;

use axum::Router;
use calendar_core::EventStore;
use tower_http::trace::TraceLayer;

// HTTP routes and DTOs
pub mod api;

pub mod config;
pub mod error;
pub mod grpc_service;
pub mod openapi;
pub mod service;

pub use config::ApiConfig;
pub use error::ApiError;
pub use grpc_service::EventServiceImpl;
pub use service::EventsService;

/// Build the HTTP gateway router over an event store.
pub fn build_router(store: Arc<dyn EventStore>) -> Router {
    let service = Arc::new(EventsService::new(store));

    Router::new()
        .merge(api::health::routes())
        .merge(api::events::routes(api::events::AppState::new(service)))
        .merge(openapi::routes())
        .layer(TraceLayer::new_for_http())
}
