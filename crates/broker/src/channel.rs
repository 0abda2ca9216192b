// Publisher / subscriber contracts
//
// The scheduler only sees NotificationPublisher and the sender only sees
// Subscriber + MessageHandler; both AMQP and the in-memory channel implement them.

use std::sync::Arc;

use async_trait::async_trait;
use calendar_core::Notification;
use tokio::sync::watch;

use crate::error::{HandlerError, Result};

/// Producer side of the message channel
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Publish one notification. Returns once the broker has accepted it.
    async fn publish(&self, notification: &Notification) -> Result<()>;

    /// Release the underlying connection. Later publishes fail with `Closed`.
    async fn close(&self) -> Result<()>;
}

/// Callback invoked once per delivered message with the raw body
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, body: &[u8]) -> std::result::Result<(), HandlerError>;
}

/// Consumer side of the message channel
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Deliver messages to `handler` one at a time until the stream closes,
    /// `stop` is called, or `shutdown` flips.
    ///
    /// Every message is acknowledged after the handler returns, whatever
    /// the handler result.
    async fn subscribe(
        &self,
        handler: Arc<dyn MessageHandler>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()>;

    /// Cancel the consumer and close the connection. Later calls are no-ops.
    async fn stop(&self) -> Result<()>;
}

/// Encode a notification the way every publisher puts it on the wire
pub fn encode_notification(notification: &Notification) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(notification)?)
}

/// Decode a message body into a notification
pub fn decode_notification(body: &[u8]) -> std::result::Result<Notification, HandlerError> {
    serde_json::from_slice(body).map_err(|e| HandlerError::Decode(e.to_string()))
}
