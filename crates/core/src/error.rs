// Error types for event store operations

/// Error type for event store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Event not found
    #[error("event not found: {0}")]
    NotFound(String),

    /// An event with the same id already exists
    #[error("event already exists: {0}")]
    AlreadyExists(String),

    /// Event id is empty
    #[error("empty event id")]
    EmptyId,

    /// Notification lead outside `0..=MAX_NOTIFY_LEAD_SECS`
    #[error("notify_lead out of range: {0} seconds (allowed 0..={max})", max = crate::event::MAX_NOTIFY_LEAD_SECS)]
    InvalidNotifyLead(i64),

    /// Notification for the event has already been recorded
    #[error("event notification already sent: {0}")]
    AlreadyNotified(String),

    /// Backend unreachable
    #[error("storage connection error: {0}")]
    Connection(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Unknown storage type in configuration
    #[error("unknown storage type: {0}")]
    UnknownStorageType(String),
}

impl StoreError {
    /// Domain errors are returned to callers; the rest are infrastructure failures.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::AlreadyExists(_)
                | Self::EmptyId
                | Self::InvalidNotifyLead(_)
                | Self::AlreadyNotified(_)
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => StoreError::Connection(e.to_string()),
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Result type for event store operations
pub type Result<T> = std::result::Result<T, StoreError>;
