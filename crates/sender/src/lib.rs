// Calendar Sender
//
// Consumes notification messages and records each one in the event store.
// Delivery is at-least-once; `mark_notified` returning AlreadyNotified is
// how duplicates are recognised and dropped.

pub mod handler;
pub mod service;

pub use handler::{NotificationHandler, MARK_TIMEOUT};
pub use service::{SenderError, SenderService, SenderStatus};
