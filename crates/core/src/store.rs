//! EventStore trait definition

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::event::Event;
use crate::period::Period;

/// Persistence contract shared by every backend.
///
/// All mutating calls are atomic per event. No backend performs
/// cross-event transactions.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a new event.
    ///
    /// Fails with `EmptyId` for a blank id, `InvalidNotifyLead` for a lead
    /// outside `0..=MAX_NOTIFY_LEAD_SECS` and `AlreadyExists` on collision.
    async fn create(&self, event: &Event) -> Result<()>;

    /// Replace title, times, owner and lead of an existing event.
    /// The `notified` flag is left untouched. Validated like `create`.
    async fn update(&self, event: &Event) -> Result<()>;

    /// Delete an event by id.
    async fn remove(&self, id: &str) -> Result<()>;

    /// Look up a single event.
    async fn get(&self, id: &str) -> Result<Option<Event>>;

    /// Events whose `start_time` falls inside `period`, ordered by `start_time`.
    async fn filter_by_period(&self, period: Period) -> Result<Vec<Event>>;

    /// Events not yet notified whose `start_time - notify_lead` falls inside `window`.
    async fn filter_by_notify_window(&self, window: Period) -> Result<Vec<Event>>;

    /// Delete every event with `start_time` strictly before `threshold`.
    /// Returns how many were removed.
    async fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64>;

    /// Set the `notified` flag.
    ///
    /// Fails with `AlreadyNotified` when it is already set; this is the
    /// idempotence guard the sender relies on.
    async fn mark_notified(&self, id: &str) -> Result<()>;

    /// Release backend resources. Default is a no-op.
    async fn close(&self) {}

    /// Events starting on the local day containing `date`.
    async fn filter_by_day(&self, date: DateTime<Utc>) -> Result<Vec<Event>> {
        self.filter_by_period(Period::day(date)).await
    }

    /// Events starting in the local Monday-based week containing `week_start`.
    async fn filter_by_week(&self, week_start: DateTime<Utc>) -> Result<Vec<Event>> {
        self.filter_by_period(Period::week(week_start)).await
    }

    /// Events starting in the local calendar month containing `month_start`.
    async fn filter_by_month(&self, month_start: DateTime<Utc>) -> Result<Vec<Event>> {
        self.filter_by_period(Period::month(month_start)).await
    }
}
