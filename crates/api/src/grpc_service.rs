// gRPC EventService
//
// Decision: Same EventsService layer as the HTTP gateway; this file only converts wire types
// Decision: Malformed requests (missing event or date) are INVALID_ARGUMENT before any store call

use std::sync::Arc;

use calendar_core::{Event, EventStore};
use calendar_protocol::proto::{
    self, CreateEventRequest, CreateEventResponse, FilterEventsByDayRequest,
    FilterEventsByDayResponse, FilterEventsByMonthRequest, FilterEventsByMonthResponse,
    FilterEventsByWeekRequest, FilterEventsByWeekResponse, GetEventRequest, GetEventResponse,
    RemoveEventRequest, RemoveEventResponse, UpdateEventRequest, UpdateEventResponse,
};
use calendar_protocol::{
    events_to_proto, required_timestamp, ConversionError, EventService, EventServiceServer,
};
use chrono::{DateTime, Utc};
use tonic::{Request, Response, Status};

use crate::service::EventsService;

pub struct EventServiceImpl {
    service: Arc<EventsService>,
}

impl EventServiceImpl {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            service: Arc::new(EventsService::new(store)),
        }
    }

    /// Create a tonic server for this service
    pub fn into_server(self) -> EventServiceServer<Self> {
        EventServiceServer::new(self)
    }
}

#[allow(clippy::result_large_err)] // tonic::Status is the standard gRPC error type
fn conversion_status(err: ConversionError) -> Status {
    Status::invalid_argument(err.to_string())
}

#[allow(clippy::result_large_err)]
fn required_event(event: Option<proto::Event>) -> Result<Event, Status> {
    event
        .ok_or(ConversionError::MissingField("event"))
        .and_then(Event::try_from)
        .map_err(conversion_status)
}

#[allow(clippy::result_large_err)]
fn required_date(date: Option<&proto::Timestamp>) -> Result<DateTime<Utc>, Status> {
    required_timestamp(date, "date").map_err(conversion_status)
}

#[tonic::async_trait]
impl EventService for EventServiceImpl {
    async fn create_event(
        &self,
        request: Request<CreateEventRequest>,
    ) -> Result<Response<CreateEventResponse>, Status> {
        let event = required_event(request.into_inner().event)?;
        let created = self.service.create(event).await.map_err(Status::from)?;
        Ok(Response::new(CreateEventResponse {
            event: Some(proto::Event::from(&created)),
        }))
    }

    async fn update_event(
        &self,
        request: Request<UpdateEventRequest>,
    ) -> Result<Response<UpdateEventResponse>, Status> {
        let event = required_event(request.into_inner().event)?;
        let updated = self.service.update(event).await.map_err(Status::from)?;
        Ok(Response::new(UpdateEventResponse {
            event: Some(proto::Event::from(&updated)),
        }))
    }

    async fn remove_event(
        &self,
        request: Request<RemoveEventRequest>,
    ) -> Result<Response<RemoveEventResponse>, Status> {
        let id = request.into_inner().id;
        self.service.remove(&id).await.map_err(Status::from)?;
        Ok(Response::new(RemoveEventResponse {}))
    }

    async fn get_event(
        &self,
        request: Request<GetEventRequest>,
    ) -> Result<Response<GetEventResponse>, Status> {
        let id = request.into_inner().id;
        let event = self.service.get(&id).await.map_err(Status::from)?;
        Ok(Response::new(GetEventResponse {
            event: Some(proto::Event::from(&event)),
        }))
    }

    async fn filter_events_by_day(
        &self,
        request: Request<FilterEventsByDayRequest>,
    ) -> Result<Response<FilterEventsByDayResponse>, Status> {
        let date = required_date(request.get_ref().date.as_ref())?;
        let events = self
            .service
            .filter_by_day(date)
            .await
            .map_err(Status::from)?;
        Ok(Response::new(FilterEventsByDayResponse {
            events: events_to_proto(&events),
        }))
    }

    async fn filter_events_by_week(
        &self,
        request: Request<FilterEventsByWeekRequest>,
    ) -> Result<Response<FilterEventsByWeekResponse>, Status> {
        let date = required_date(request.get_ref().date.as_ref())?;
        let events = self
            .service
            .filter_by_week(date)
            .await
            .map_err(Status::from)?;
        Ok(Response::new(FilterEventsByWeekResponse {
            events: events_to_proto(&events),
        }))
    }

    async fn filter_events_by_month(
        &self,
        request: Request<FilterEventsByMonthRequest>,
    ) -> Result<Response<FilterEventsByMonthResponse>, Status> {
        let date = required_date(request.get_ref().date.as_ref())?;
        let events = self
            .service
            .filter_by_month(date)
            .await
            .map_err(Status::from)?;
        Ok(Response::new(FilterEventsByMonthResponse {
            events: events_to_proto(&events),
        }))
    }
}
