// Error types for the message channel

use calendar_core::StoreError;

/// Error type for broker operations
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Could not reach the broker or open a channel
    #[error("broker connection error: {0}")]
    Connection(String),

    /// Exchange, queue or binding declaration failed
    #[error("topology declaration failed: {0}")]
    Topology(String),

    /// Publish was rejected or never confirmed
    #[error("publish failed: {0}")]
    Publish(String),

    /// Consumer could not be started or the delivery stream failed
    #[error("consume failed: {0}")]
    Consume(String),

    /// Acknowledgement could not be sent
    #[error("ack failed: {0}")]
    Ack(String),

    /// Payload could not be encoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The channel was stopped
    #[error("channel closed")]
    Closed,
}

/// Error returned by a message handler.
///
/// The consumer logs it and acknowledges the message anyway.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Malformed payload
    #[error("decode error: {0}")]
    Decode(String),

    /// Store call failed while handling the message
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Store call did not finish in time
    #[error("handler timed out after {0:?}")]
    Timeout(std::time::Duration),
}

pub type Result<T> = std::result::Result<T, BrokerError>;
