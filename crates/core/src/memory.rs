//! In-memory implementation of EventStore for dev mode and testing

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::event::Event;
use crate::period::Period;
use crate::store::EventStore;

/// In-memory implementation of EventStore
///
/// A single reader/writer lock protects the whole map, so every call is
/// atomic with respect to concurrent callers. Data is lost on restart.
///
/// # Example
///
/// ```
/// use calendar_core::InMemoryEventStore;
///
/// let store = InMemoryEventStore::new();
/// assert_eq!(store.len(), 0);
/// ```
#[derive(Default)]
pub struct InMemoryEventStore {
    events: RwLock<HashMap<String, Event>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, replacing events that share an id.
    pub fn with_events(events: impl IntoIterator<Item = Event>) -> Self {
        let events = events.into_iter().map(|e| (e.id.clone(), e)).collect();
        Self {
            events: RwLock::new(events),
        }
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    fn collect_sorted(&self, predicate: impl Fn(&Event) -> bool) -> Vec<Event> {
        let mut result: Vec<Event> = self
            .events
            .read()
            .values()
            .filter(|e| predicate(e))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        result
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn create(&self, event: &Event) -> Result<()> {
        event.validate()?;
        let mut events = self.events.write();
        if events.contains_key(&event.id) {
            return Err(StoreError::AlreadyExists(event.id.clone()));
        }
        events.insert(event.id.clone(), event.clone());
        debug!(event_id = %event.id, "created event");
        Ok(())
    }

    async fn update(&self, event: &Event) -> Result<()> {
        event.validate()?;
        let mut events = self.events.write();
        let existing = events
            .get_mut(&event.id)
            .ok_or_else(|| StoreError::NotFound(event.id.clone()))?;
        let notified = existing.notified;
        *existing = Event {
            notified,
            ..event.clone()
        };
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.events
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn get(&self, id: &str) -> Result<Option<Event>> {
        Ok(self.events.read().get(id).cloned())
    }

    async fn filter_by_period(&self, period: Period) -> Result<Vec<Event>> {
        Ok(self.collect_sorted(|e| period.contains(e.start_time)))
    }

    async fn filter_by_notify_window(&self, window: Period) -> Result<Vec<Event>> {
        Ok(self.collect_sorted(|e| !e.notified && window.contains(e.notify_at())))
    }

    async fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64> {
        let mut events = self.events.write();
        let before = events.len();
        events.retain(|_, e| e.start_time >= threshold);
        Ok((before - events.len()) as u64)
    }

    async fn mark_notified(&self, id: &str) -> Result<()> {
        let mut events = self.events.write();
        let event = events
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if event.notified {
            return Err(StoreError::AlreadyNotified(id.to_string()));
        }
        event.notified = true;
        Ok(())
    }
}
