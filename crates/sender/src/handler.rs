//! Notification message handler

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calendar_broker::{decode_notification, HandlerError, MessageHandler};
use calendar_core::{EventStore, StoreError};
use tracing::{debug, info};

/// Upper bound on a single `mark_notified` call
pub const MARK_TIMEOUT: Duration = Duration::from_secs(5);

/// Records delivered notifications in the event store.
///
/// A duplicate delivery (`AlreadyNotified`) counts as success.
pub struct NotificationHandler {
    store: Arc<dyn EventStore>,
    mark_timeout: Duration,
}

impl NotificationHandler {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            mark_timeout: MARK_TIMEOUT,
        }
    }

    pub fn with_mark_timeout(mut self, timeout: Duration) -> Self {
        self.mark_timeout = timeout;
        self
    }
}

#[async_trait]
impl MessageHandler for NotificationHandler {
    async fn handle(&self, body: &[u8]) -> Result<(), HandlerError> {
        let notification = decode_notification(body)?;
        info!(
            event_id = %notification.event_id,
            owner_id = %notification.owner_id,
            title = %notification.title,
            start_time = %notification.start_time,
            "Received notification"
        );

        let marked = tokio::time::timeout(
            self.mark_timeout,
            self.store.mark_notified(&notification.event_id),
        )
        .await
        .map_err(|_| HandlerError::Timeout(self.mark_timeout))?;

        match marked {
            Ok(()) => {
                info!(event_id = %notification.event_id, "Marked event as notified");
                Ok(())
            }
            Err(StoreError::AlreadyNotified(_)) => {
                debug!(event_id = %notification.event_id, "Event already notified");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calendar_broker::encode_notification;
    use calendar_core::{Event, InMemoryEventStore, Notification, Period};
    use chrono::{DateTime, Utc};

    fn body_for(event: &Event) -> Vec<u8> {
        encode_notification(&Notification::from(event)).unwrap()
    }

    #[tokio::test]
    async fn test_marks_event_and_tolerates_duplicates() {
        let now = Utc::now();
        let event = Event::new("a", "t", now, now, "o");
        let store = Arc::new(InMemoryEventStore::with_events([event.clone()]));
        let handler = NotificationHandler::new(store.clone());

        handler.handle(&body_for(&event)).await.unwrap();
        assert!(store.get("a").await.unwrap().unwrap().notified);

        handler.handle(&body_for(&event)).await.unwrap();
        assert!(store.get("a").await.unwrap().unwrap().notified);
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let handler = NotificationHandler::new(Arc::new(InMemoryEventStore::new()));
        let err = handler.handle(b"{not json").await.unwrap_err();
        assert!(matches!(err, HandlerError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unknown_event_is_store_error() {
        let now = Utc::now();
        let handler = NotificationHandler::new(Arc::new(InMemoryEventStore::new()));
        let err = handler
            .handle(&body_for(&Event::new("gone", "t", now, now, "o")))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Store(StoreError::NotFound(_))));
    }

    struct StallingStore;

    #[async_trait]
    impl EventStore for StallingStore {
        async fn create(&self, _: &Event) -> calendar_core::Result<()> {
            Ok(())
        }
        async fn update(&self, _: &Event) -> calendar_core::Result<()> {
            Ok(())
        }
        async fn remove(&self, _: &str) -> calendar_core::Result<()> {
            Ok(())
        }
        async fn get(&self, _: &str) -> calendar_core::Result<Option<Event>> {
            Ok(None)
        }
        async fn filter_by_period(&self, _: Period) -> calendar_core::Result<Vec<Event>> {
            Ok(vec![])
        }
        async fn filter_by_notify_window(&self, _: Period) -> calendar_core::Result<Vec<Event>> {
            Ok(vec![])
        }
        async fn delete_older_than(&self, _: DateTime<Utc>) -> calendar_core::Result<u64> {
            Ok(0)
        }
        async fn mark_notified(&self, _: &str) -> calendar_core::Result<()> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_is_bounded_by_timeout() {
        let now = Utc::now();
        let handler = NotificationHandler::new(Arc::new(StallingStore));
        let err = handler
            .handle(&body_for(&Event::new("slow", "t", now, now, "o")))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Timeout(d) if d == MARK_TIMEOUT));
    }
}
