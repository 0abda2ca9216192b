// Calendar Core
//
// This crate holds the storage-agnostic pieces shared by every calendar service:
// the Event and Notification entities, the EventStore contract and its backends.
//
// Key design decisions:
// - EventStore is an async trait so services hold `Arc<dyn EventStore>` and never
//   know which backend is behind it
// - Backends: InMemoryEventStore (dev mode, tests) and PostgresEventStore (production)
// - Calendar periods are half-open and computed in the process-local time zone
// - `mark_notified` is the single idempotence guard for notification delivery
// - Schema migrations are embedded and applied on demand, never implicitly

pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod memory;
pub mod period;
pub mod postgres;
pub mod shutdown;
pub mod store;

// Telemetry (structured logging setup)
pub mod telemetry;

// Re-exports for convenience
pub use backend::StorageBackend;
pub use config::{StorageConfig, StorageKind};
pub use error::{Result, StoreError};
pub use event::{Event, Notification, MAX_NOTIFY_LEAD_SECS};
pub use memory::InMemoryEventStore;
pub use period::Period;
pub use postgres::PostgresEventStore;
pub use store::EventStore;
