// Event HTTP routes
//
// Decision: The gateway mirrors the gRPC EventService one route per rpc
// Decision: Clients never send `notified`; only the sender sets it

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use calendar_core::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common::{ErrorResponse, ListResponse};
use crate::error::ApiError;
use crate::service::EventsService;

/// Request to create an event
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    /// Caller-assigned identifier, unique within the store.
    #[schema(example = "standup-2024-03-04")]
    pub id: String,
    #[schema(example = "Daily standup")]
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[schema(example = "alice")]
    pub owner_id: String,
    /// Seconds before `start_time` at which the notification fires.
    #[serde(default)]
    #[schema(example = 600)]
    pub notify_lead: i64,
}

impl From<CreateEventRequest> for Event {
    fn from(req: CreateEventRequest) -> Self {
        Event {
            id: req.id,
            title: req.title,
            start_time: req.start_time,
            end_time: req.end_time,
            owner_id: req.owner_id,
            notify_lead: req.notify_lead,
            notified: false,
        }
    }
}

/// Request to replace an event. The id comes from the path.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateEventRequest {
    #[schema(example = "Daily standup (moved)")]
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub owner_id: String,
    #[serde(default)]
    pub notify_lead: i64,
}

impl UpdateEventRequest {
    fn into_event(self, id: String) -> Event {
        Event {
            id,
            title: self.title,
            start_time: self.start_time,
            end_time: self.end_time,
            owner_id: self.owner_id,
            notify_lead: self.notify_lead,
            notified: false,
        }
    }
}

/// Anchor for the day/week/month queries
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateQuery {
    /// RFC 3339 instant inside the requested period.
    pub date: Option<DateTime<Utc>>,
}

impl DateQuery {
    fn required(self) -> Result<DateTime<Utc>, ApiError> {
        self.date
            .ok_or_else(|| ApiError::invalid_argument("missing required query parameter: date"))
    }
}

/// App state for event routes
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EventsService>,
}

impl AppState {
    pub fn new(service: Arc<EventsService>) -> Self {
        Self { service }
    }
}

/// Create event routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/events", post(create_event))
        .route("/v1/events/day", get(filter_by_day))
        .route("/v1/events/week", get(filter_by_week))
        .route("/v1/events/month", get(filter_by_month))
        .route(
            "/v1/events/:id",
            get(get_event).put(update_event).delete(remove_event),
        )
        .with_state(state)
}

/// POST /v1/events - Create an event
#[utoipa::path(
    post,
    path = "/v1/events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = Event),
        (status = 400, description = "Blank id", body = ErrorResponse),
        (status = 409, description = "Id already in use", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    let event = state.service.create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /v1/events/{id} - Get an event
#[utoipa::path(
    get,
    path = "/v1/events/{id}",
    params(
        ("id" = String, Path, description = "Event ID")
    ),
    responses(
        (status = 200, description = "Event found", body = Event),
        (status = 404, description = "Event not found", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.service.get(&id).await?))
}

/// PUT /v1/events/{id} - Replace an event's fields
#[utoipa::path(
    put,
    path = "/v1/events/{id}",
    params(
        ("id" = String, Path, description = "Event ID")
    ),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated", body = Event),
        (status = 404, description = "Event not found", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.service.update(req.into_event(id)).await?))
}

/// DELETE /v1/events/{id} - Remove an event
#[utoipa::path(
    delete,
    path = "/v1/events/{id}",
    params(
        ("id" = String, Path, description = "Event ID")
    ),
    responses(
        (status = 204, description = "Event removed"),
        (status = 404, description = "Event not found", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn remove_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /v1/events/day - Events starting on the local day containing `date`
#[utoipa::path(
    get,
    path = "/v1/events/day",
    params(DateQuery),
    responses(
        (status = 200, description = "Events ordered by start time", body = ListResponse<Event>),
        (status = 400, description = "Missing date", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn filter_by_day(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<ListResponse<Event>>, ApiError> {
    let events = state.service.filter_by_day(query.required()?).await?;
    Ok(Json(events.into()))
}

/// GET /v1/events/week - Events starting in the Monday-based week containing `date`
#[utoipa::path(
    get,
    path = "/v1/events/week",
    params(DateQuery),
    responses(
        (status = 200, description = "Events ordered by start time", body = ListResponse<Event>),
        (status = 400, description = "Missing date", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn filter_by_week(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<ListResponse<Event>>, ApiError> {
    let events = state.service.filter_by_week(query.required()?).await?;
    Ok(Json(events.into()))
}

/// GET /v1/events/month - Events starting in the calendar month containing `date`
#[utoipa::path(
    get,
    path = "/v1/events/month",
    params(DateQuery),
    responses(
        (status = 200, description = "Events ordered by start time", body = ListResponse<Event>),
        (status = 400, description = "Missing date", body = ErrorResponse)
    ),
    tag = "events"
)]
pub async fn filter_by_month(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<ListResponse<Event>>, ApiError> {
    let events = state.service.filter_by_month(query.required()?).await?;
    Ok(Json(events.into()))
}
