//! Scan and purge logic plus the timer loop that drives it

use std::sync::Arc;

use calendar_broker::{BrokerError, NotificationPublisher};
use calendar_core::{EventStore, Notification, Period, StoreError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::config::SchedulerConfig;

/// Scheduler errors
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("store query exceeded the scan interval")]
    Timeout,

    #[error("failed to publish notification for event {event_id}: {source}")]
    Publish {
        event_id: String,
        #[source]
        source: BrokerError,
    },

    #[error("scheduler cannot start from state {0:?}")]
    InvalidState(crate::service::SchedulerStatus),
}

/// Finds due events and publishes their notifications.
pub struct Scheduler {
    store: Arc<dyn EventStore>,
    publisher: Arc<dyn NotificationPublisher>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn EventStore>,
        publisher: Arc<dyn NotificationPublisher>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// One scan tick: publish a notification for every event whose
    /// notification moment falls in `[now, now + scan_interval)`.
    ///
    /// Stops at the first publish failure; notifications already sent in
    /// this tick stay sent.
    #[instrument(skip(self), fields(window_start = %now))]
    pub async fn scan_once(&self, now: DateTime<Utc>) -> Result<usize, SchedulerError> {
        let window = Period::scan_window(now, self.config.scan_interval);

        let candidates = tokio::time::timeout(
            self.config.scan_interval,
            self.store.filter_by_notify_window(window),
        )
        .await
        .map_err(|_| SchedulerError::Timeout)??;

        let mut sent = 0;
        for event in candidates
            .iter()
            .filter(|e| window.contains(e.notify_at()))
        {
            self.publisher
                .publish(&Notification::from(event))
                .await
                .map_err(|source| SchedulerError::Publish {
                    event_id: event.id.clone(),
                    source,
                })?;
            debug!(event_id = %event.id, "notification published");
            sent += 1;
        }

        Ok(sent)
    }

    /// One purge tick: delete events that started before `now - clean_threshold_days`.
    #[instrument(skip(self))]
    pub async fn purge_once(&self, now: DateTime<Utc>) -> Result<u64, SchedulerError> {
        let Some(threshold) = ChronoDuration::try_days(i64::from(self.config.clean_threshold_days))
            .and_then(|age| now.checked_sub_signed(age))
        else {
            warn!(
                clean_threshold_days = self.config.clean_threshold_days,
                "Purge skipped: threshold out of range"
            );
            return Ok(0);
        };
        info!(threshold = %threshold, "Removing events older than threshold");

        let deleted = self.store.delete_older_than(threshold).await?;
        if deleted > 0 {
            info!(count = deleted, "Removed old events");
        } else {
            info!("No old events to remove");
        }
        Ok(deleted)
    }

    /// Run scan and purge ticks until `shutdown` flips.
    ///
    /// The first tick of each timer fires one period after the call. Tick
    /// errors are logged and never end the loop.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let scan_interval = self.config.scan_interval;
        let clean_interval = self.config.clean_interval;

        let mut scan_ticker = interval_at(Instant::now() + scan_interval, scan_interval);
        scan_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut clean_ticker = interval_at(Instant::now() + clean_interval, clean_interval);
        clean_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            scan_interval_secs = scan_interval.as_secs(),
            clean_interval_secs = clean_interval.as_secs(),
            clean_threshold_days = self.config.clean_threshold_days,
            "Scheduler loop started"
        );

        loop {
            tokio::select! {
                _ = scan_ticker.tick() => {
                    match self.scan_once(Utc::now()).await {
                        Ok(count) => info!(count, "Scan complete"),
                        Err(SchedulerError::Timeout) => warn!("Scan skipped: store query timed out"),
                        Err(e) => error!("Scan failed: {}", e),
                    }
                }
                _ = clean_ticker.tick() => {
                    if let Err(e) = self.purge_once(Utc::now()).await {
                        error!("Failed to clean old events: {}", e);
                    }
                }
                _ = shutdown.changed() => {
                    debug!("Scheduler loop: shutdown requested");
                    break;
                }
            }
        }

        debug!("Scheduler loop exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calendar_broker::InMemoryChannel;
    use calendar_core::{Event, InMemoryEventStore};
    use std::time::Duration;

    fn scheduler_with(
        events: Vec<Event>,
        config: SchedulerConfig,
    ) -> (Scheduler, Arc<InMemoryEventStore>, Arc<InMemoryChannel>) {
        let store = Arc::new(InMemoryEventStore::with_events(events));
        let channel = InMemoryChannel::shared();
        let scheduler = Scheduler::new(store.clone(), channel.clone(), config);
        (scheduler, store, channel)
    }

    fn event(id: &str, start: DateTime<Utc>, lead_secs: i64) -> Event {
        Event::new(id, id, start, start + ChronoDuration::hours(1), "owner")
            .with_notify_lead(ChronoDuration::seconds(lead_secs))
    }

    #[tokio::test]
    async fn test_scan_publishes_only_inside_window() {
        let now = Utc::now();
        let config = SchedulerConfig::default().with_scan_interval(Duration::from_secs(60));
        let (scheduler, _store, channel) = scheduler_with(
            vec![
                // notify_at == now: window start is inclusive
                event("at-start", now + ChronoDuration::seconds(30), 30),
                event("inside", now + ChronoDuration::seconds(90), 60),
                // notify_at == now + 60s: window end is exclusive
                event("at-end", now + ChronoDuration::seconds(120), 60),
                event("past", now - ChronoDuration::seconds(1), 0),
            ],
            config,
        );

        let sent = scheduler.scan_once(now).await.unwrap();
        assert_eq!(sent, 2);
        assert_eq!(channel.published(), 2);
    }

    #[tokio::test]
    async fn test_scan_survives_unvalidated_huge_lead() {
        let now = Utc::now();
        let mut huge = event("huge", now + ChronoDuration::seconds(30), 0);
        huge.notify_lead = 10_000_000_000_000_000;
        let (scheduler, _store, channel) = scheduler_with(
            vec![huge, event("due", now + ChronoDuration::seconds(10), 0)],
            SchedulerConfig::default(),
        );

        assert_eq!(scheduler.scan_once(now).await.unwrap(), 1);
        assert_eq!(channel.published(), 1);
    }

    #[tokio::test]
    async fn test_scan_skips_notified_events() {
        let now = Utc::now();
        let mut done = event("done", now + ChronoDuration::seconds(10), 0);
        done.notified = true;
        let (scheduler, _store, channel) =
            scheduler_with(vec![done], SchedulerConfig::default());

        assert_eq!(scheduler.scan_once(now).await.unwrap(), 0);
        assert_eq!(channel.published(), 0);
    }

    #[tokio::test]
    async fn test_publish_failure_aborts_tick() {
        let now = Utc::now();
        let (scheduler, _store, channel) = scheduler_with(
            vec![event("a", now + ChronoDuration::seconds(5), 0)],
            SchedulerConfig::default(),
        );
        channel.close().await.unwrap();

        let err = scheduler.scan_once(now).await.unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Publish { ref event_id, source: BrokerError::Closed } if event_id == "a"
        ));
    }

    #[tokio::test]
    async fn test_purge_removes_old_events() {
        let now = Utc::now();
        let config = SchedulerConfig::default().with_clean_threshold_days(30);
        let (scheduler, store, _channel) = scheduler_with(
            vec![
                event("old", now - ChronoDuration::days(31), 0),
                event("recent", now - ChronoDuration::days(29), 0),
                event("future", now + ChronoDuration::days(1), 0),
            ],
            config,
        );

        assert_eq!(scheduler.purge_once(now).await.unwrap(), 1);
        assert!(store.get("old").await.unwrap().is_none());
        assert_eq!(store.len(), 2);

        assert_eq!(scheduler.purge_once(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_purge_with_out_of_range_threshold_is_skipped() {
        let now = Utc::now();
        let mut config = SchedulerConfig::default();
        config.clean_threshold_days = u32::MAX;
        let (scheduler, store, _channel) = scheduler_with(
            vec![event("old", now - ChronoDuration::days(3650), 0)],
            config,
        );

        assert_eq!(scheduler.purge_once(now).await.unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let (scheduler, _store, _channel) = scheduler_with(vec![], SchedulerConfig::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let scheduler = Arc::new(scheduler);
        let task = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run(shutdown_rx).await })
        };

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
