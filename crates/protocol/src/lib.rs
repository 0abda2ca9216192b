// Calendar Protocol
//
// Decision: Own Timestamp message instead of google.protobuf well-known types
// Decision: Proto is transport layer, calendar-core types remain source of truth

use calendar_core::Event;
use chrono::{DateTime, TimeZone, Utc};

// Generated protobuf code
pub mod proto {
    tonic::include_proto!("calendar.v1");
}

// Re-export for convenience
pub use proto::event_service_client::EventServiceClient;
pub use proto::event_service_server::{EventService, EventServiceServer};

// ============================================================================
// Error types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Timestamp out of range: {seconds}s {nanos}ns")]
    InvalidTimestamp { seconds: i64, nanos: i32 },
}

// ============================================================================
// Timestamp conversion
// ============================================================================

/// Convert from proto Timestamp to chrono DateTime<Utc>
pub fn proto_timestamp_to_datetime(
    value: &proto::Timestamp,
) -> Result<DateTime<Utc>, ConversionError> {
    let invalid = || ConversionError::InvalidTimestamp {
        seconds: value.seconds,
        nanos: value.nanos,
    };
    let nanos = u32::try_from(value.nanos).map_err(|_| invalid())?;
    Utc.timestamp_opt(value.seconds, nanos)
        .single()
        .ok_or_else(invalid)
}

/// Convert from chrono DateTime<Utc> to proto Timestamp
pub fn datetime_to_proto_timestamp(value: DateTime<Utc>) -> proto::Timestamp {
    proto::Timestamp {
        seconds: value.timestamp(),
        nanos: value.timestamp_subsec_nanos() as i32,
    }
}

/// Read a required timestamp field
pub fn required_timestamp(
    value: Option<&proto::Timestamp>,
    field: &'static str,
) -> Result<DateTime<Utc>, ConversionError> {
    value
        .ok_or(ConversionError::MissingField(field))
        .and_then(proto_timestamp_to_datetime)
}

// ============================================================================
// Event conversion
// ============================================================================

impl From<&Event> for proto::Event {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            title: event.title.clone(),
            start: Some(datetime_to_proto_timestamp(event.start_time)),
            end: Some(datetime_to_proto_timestamp(event.end_time)),
            owner_id: event.owner_id.clone(),
            notify_lead: event.notify_lead,
            notified: event.notified,
        }
    }
}

impl TryFrom<proto::Event> for Event {
    type Error = ConversionError;

    /// The wire `notified` flag is ignored; only the sender sets it.
    fn try_from(value: proto::Event) -> Result<Self, Self::Error> {
        Ok(Event {
            start_time: required_timestamp(value.start.as_ref(), "event.start")?,
            end_time: required_timestamp(value.end.as_ref(), "event.end")?,
            id: value.id,
            title: value.title,
            owner_id: value.owner_id,
            notify_lead: value.notify_lead,
            notified: false,
        })
    }
}

/// Convert a slice of domain events for a filter response
pub fn events_to_proto(events: &[Event]) -> Vec<proto::Event> {
    events.iter().map(proto::Event::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_conversion_keeps_nanos() {
        let now = Utc.timestamp_opt(1_709_719_200, 123_456_789).unwrap();
        let proto = datetime_to_proto_timestamp(now);
        assert_eq!(proto.seconds, 1_709_719_200);
        assert_eq!(proto.nanos, 123_456_789);
        assert_eq!(proto_timestamp_to_datetime(&proto).unwrap(), now);
    }

    #[test]
    fn test_invalid_timestamp() {
        let negative_nanos = proto::Timestamp {
            seconds: 0,
            nanos: -1,
        };
        assert!(matches!(
            proto_timestamp_to_datetime(&negative_nanos),
            Err(ConversionError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_event_requires_start_and_end() {
        let wire = proto::Event {
            id: "e1".to_string(),
            title: "t".to_string(),
            start: None,
            end: None,
            owner_id: "u1".to_string(),
            notify_lead: 60,
            notified: false,
        };
        let err = Event::try_from(wire).unwrap_err();
        assert!(matches!(err, ConversionError::MissingField("event.start")));
    }

    #[test]
    fn test_event_ignores_wire_notified_flag() {
        let start = Utc.with_ymd_and_hms(2024, 3, 6, 10, 0, 0).unwrap();
        let mut event = Event::new("e1", "Standup", start, start, "u1");
        event.notified = true;

        let wire = proto::Event::from(&event);
        assert!(wire.notified);
        assert_eq!(wire.start.as_ref().map(|t| t.seconds), Some(start.timestamp()));

        let back = Event::try_from(wire).unwrap();
        assert!(!back.notified);
        assert_eq!(back.start_time, start);
        assert_eq!(back.owner_id, "u1");
    }
}
