//! End-to-end sender tests over the in-memory store and channel
//!
//! Run with: cargo test -p calendar-sender --test pipeline_test

use std::sync::Arc;
use std::time::Duration;

use calendar_broker::{InMemoryChannel, NotificationPublisher};
use calendar_core::{Event, EventStore, InMemoryEventStore, Notification};
use calendar_scheduler::{SchedulerConfig, SchedulerService};
use calendar_sender::{SenderService, SenderStatus};
use chrono::{Duration as ChronoDuration, Utc};

async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..60 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    condition()
}

fn event(id: &str) -> Event {
    let start = Utc::now() + ChronoDuration::hours(1);
    Event::new(id, "Review", start, start + ChronoDuration::hours(1), "owner-7")
}

#[tokio::test]
async fn test_sender_marks_and_tolerates_duplicates() {
    let event = event("dup-1");
    let store = Arc::new(InMemoryEventStore::with_events([event.clone()]));
    let channel = InMemoryChannel::shared();

    let sender = Arc::new(SenderService::new());
    let task = {
        let sender = sender.clone();
        let store = store.clone();
        let channel = channel.clone();
        tokio::spawn(async move { sender.run_with(store, channel).await })
    };

    let notification = Notification::from(&event);
    channel.publish(&notification).await.unwrap();
    assert!(wait_until(|| channel.acked() == 1).await);
    assert!(store.get("dup-1").await.unwrap().unwrap().notified);
    assert_eq!(sender.status(), SenderStatus::Consuming);

    // Redelivery is acknowledged and leaves the flag set
    channel.publish(&notification).await.unwrap();
    assert!(wait_until(|| channel.acked() == 2).await);
    assert!(store.get("dup-1").await.unwrap().unwrap().notified);

    sender.stop().await;
    task.await.unwrap().unwrap();
    assert_eq!(sender.status(), SenderStatus::Stopped);

    // Second stop is a no-op
    sender.stop().await;
    assert_eq!(sender.status(), SenderStatus::Stopped);
}

#[tokio::test]
async fn test_malformed_and_unknown_messages_are_acked() {
    let store = Arc::new(InMemoryEventStore::new());
    let channel = InMemoryChannel::shared();

    let sender = Arc::new(SenderService::new());
    let task = {
        let sender = sender.clone();
        let store = store.clone();
        let channel = channel.clone();
        tokio::spawn(async move { sender.run_with(store, channel).await })
    };

    channel.publish_raw("definitely not json").unwrap();
    channel
        .publish(&Notification::from(&event("missing")))
        .await
        .unwrap();

    assert!(wait_until(|| channel.acked() == 2).await);
    assert_eq!(sender.status(), SenderStatus::Consuming);

    sender.stop().await;
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_scheduler_to_sender_pipeline() {
    let now = Utc::now();
    let due = Event::new(
        "pipeline-1",
        "Sync",
        now + ChronoDuration::seconds(3),
        now + ChronoDuration::seconds(1800),
        "owner-9",
    )
    .with_notify_lead(ChronoDuration::seconds(1));

    let store = Arc::new(InMemoryEventStore::with_events([due]));
    let channel = InMemoryChannel::shared();

    let sender = Arc::new(SenderService::new());
    let sender_task = {
        let sender = sender.clone();
        let store = store.clone();
        let channel = channel.clone();
        tokio::spawn(async move { sender.run_with(store, channel).await })
    };

    let scheduler = SchedulerService::new(
        SchedulerConfig::default().with_scan_interval(Duration::from_secs(1)),
    );
    scheduler
        .start_with(store.clone(), channel.clone())
        .unwrap();

    assert!(wait_until(|| channel.acked() >= 1).await);
    assert!(store.get("pipeline-1").await.unwrap().unwrap().notified);

    scheduler.stop().await;
    sender.stop().await;
    sender_task.await.unwrap().unwrap();

    // A notified event is never published again
    assert_eq!(channel.published(), 1);
}
