// Calendar Scheduler
//
// Periodically scans the event store for events whose notification moment
// falls in the current scan window, publishes one Notification per match,
// and purges events older than the retention threshold.

pub mod config;
pub mod scheduler;
pub mod service;

pub use config::SchedulerConfig;
pub use scheduler::{Scheduler, SchedulerError};
pub use service::{SchedulerService, SchedulerStatus};
