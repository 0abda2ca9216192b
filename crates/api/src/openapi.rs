// OpenAPI specification
//
// Served as JSON by the gateway and printed by `calendar-api openapi`.

use axum::{routing::get, Json, Router};
use calendar_core::Event;
use utoipa::OpenApi;

use crate::api;
use crate::api::{ErrorResponse, ListResponse};

/// OpenAPI documentation for the calendar HTTP gateway
#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health,
        api::events::create_event,
        api::events::get_event,
        api::events::update_event,
        api::events::remove_event,
        api::events::filter_by_day,
        api::events::filter_by_week,
        api::events::filter_by_month,
    ),
    components(
        schemas(
            Event,
            api::events::CreateEventRequest,
            api::events::UpdateEventRequest,
            api::health::HealthResponse,
            ListResponse<Event>,
            ErrorResponse,
        )
    ),
    tags(
        (name = "events", description = "Calendar event management"),
        (name = "health", description = "Liveness")
    ),
    info(
        title = "Calendar API",
        description = "HTTP/JSON gateway for the calendar.v1.EventService",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Pretty-printed JSON document
    pub fn to_json() -> Result<String, serde_json::Error> {
        Self::openapi().to_pretty_json()
    }
}

pub fn routes() -> Router {
    Router::new().route("/api-doc/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
