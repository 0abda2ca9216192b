// Event domain types
//
// These types represent the calendar Event entity and the Notification
// payload the scheduler publishes for it.
// Used by the api, scheduler and sender crates.

use chrono::{DateTime, Duration, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Largest accepted `notify_lead`: 366 days, in seconds.
pub const MAX_NOTIFY_LEAD_SECS: i64 = 366 * 24 * 60 * 60;

/// Event - a scheduled calendar entry.
/// The `id` is assigned by the caller and must be unique within the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Event {
    /// Externally assigned identifier.
    #[cfg_attr(feature = "openapi", schema(example = "standup-2024-03-04"))]
    pub id: String,
    /// Human readable title.
    #[cfg_attr(feature = "openapi", schema(example = "Daily standup"))]
    pub title: String,
    /// When the event starts.
    pub start_time: DateTime<Utc>,
    /// When the event ends. Not validated against `start_time`.
    pub end_time: DateTime<Utc>,
    /// Owner of the event; copied into notifications.
    pub owner_id: String,
    /// Seconds before `start_time` at which the notification fires.
    /// Must lie in `0..=MAX_NOTIFY_LEAD_SECS`.
    #[serde(default)]
    pub notify_lead: i64,
    /// Set once by the sender after the notification has been handled.
    #[serde(default)]
    pub notified: bool,
}

impl Event {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start_time,
            end_time,
            owner_id: owner_id.into(),
            notify_lead: 0,
            notified: false,
        }
    }

    pub fn with_notify_lead(mut self, lead: Duration) -> Self {
        self.notify_lead = lead.num_seconds();
        self
    }

    /// The instant the notification for this event is due.
    ///
    /// Saturates at the ends of the representable range, so an unchecked
    /// lead never panics.
    pub fn notify_at(&self) -> DateTime<Utc> {
        TimeDelta::try_seconds(self.notify_lead)
            .and_then(|lead| self.start_time.checked_sub_signed(lead))
            .unwrap_or(if self.notify_lead > 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            })
    }

    /// Checks every store backend applies before writing.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.has_blank_id() {
            return Err(StoreError::EmptyId);
        }
        if !(0..=MAX_NOTIFY_LEAD_SECS).contains(&self.notify_lead) {
            return Err(StoreError::InvalidNotifyLead(self.notify_lead));
        }
        Ok(())
    }

    /// True when the id is empty or whitespace only.
    pub fn has_blank_id(&self) -> bool {
        self.id.trim().is_empty()
    }
}

/// Notification - payload carried on the message channel.
/// Immutable once published; the sender may receive the same one twice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub event_id: String,
    pub title: String,
    pub owner_id: String,
    pub start_time: DateTime<Utc>,
}

impl From<&Event> for Notification {
    fn from(event: &Event) -> Self {
        Self {
            event_id: event.id.clone(),
            title: event.title.clone(),
            owner_id: event.owner_id.clone(),
            start_time: event.start_time,
        }
    }
}
