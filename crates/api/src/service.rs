// Event service layer
//
// Decision: HTTP handlers and the gRPC service both call through here; neither touches the store directly

use std::sync::Arc;

use calendar_core::{Event, EventStore, StoreError};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::ApiError;

pub struct EventsService {
    store: Arc<dyn EventStore>,
}

impl EventsService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, event: Event) -> Result<Event, ApiError> {
        self.store.create(&event).await?;
        info!(event_id = %event.id, start_time = %event.start_time, "Event created");
        Ok(event)
    }

    /// Replace the mutable fields and return the stored event, with its
    /// current `notified` flag.
    pub async fn update(&self, event: Event) -> Result<Event, ApiError> {
        self.store.update(&event).await?;
        info!(event_id = %event.id, "Event updated");
        self.get(&event.id).await
    }

    pub async fn remove(&self, id: &str) -> Result<(), ApiError> {
        self.store.remove(id).await?;
        info!(event_id = %id, "Event removed");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Event, ApiError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()).into())
    }

    pub async fn filter_by_day(&self, date: DateTime<Utc>) -> Result<Vec<Event>, ApiError> {
        Ok(self.store.filter_by_day(date).await?)
    }

    pub async fn filter_by_week(&self, date: DateTime<Utc>) -> Result<Vec<Event>, ApiError> {
        Ok(self.store.filter_by_week(date).await?)
    }

    pub async fn filter_by_month(&self, date: DateTime<Utc>) -> Result<Vec<Event>, ApiError> {
        Ok(self.store.filter_by_month(date).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calendar_core::InMemoryEventStore;
    use chrono::Duration;

    fn service() -> (Arc<InMemoryEventStore>, EventsService) {
        let store = Arc::new(InMemoryEventStore::new());
        (store.clone(), EventsService::new(store))
    }

    fn event(id: &str) -> Event {
        let start = Utc::now() + Duration::hours(2);
        Event::new(id, "Planning", start, start + Duration::hours(1), "carol")
    }

    #[tokio::test]
    async fn test_update_returns_stored_notified_flag() {
        let (store, service) = service();
        service.create(event("ev-1")).await.unwrap();
        store.mark_notified("ev-1").await.unwrap();

        let mut changed = event("ev-1");
        changed.title = "Replanning".to_string();
        let updated = service.update(changed).await.unwrap();

        assert_eq!(updated.title, "Replanning");
        assert!(updated.notified);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_, service) = service();
        let err = service.get("nope").await.unwrap_err();
        assert!(matches!(err, ApiError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_missing_is_not_found() {
        let (_, service) = service();
        let err = service.remove("nope").await.unwrap_err();
        assert!(matches!(err, ApiError::Store(StoreError::NotFound(_))));
    }
}
