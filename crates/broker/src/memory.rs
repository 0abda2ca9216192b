//! In-process message channel for dev mode and testing

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use calendar_core::Notification;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, warn};

use crate::channel::{encode_notification, MessageHandler, NotificationPublisher, Subscriber};
use crate::error::{BrokerError, Result};

/// Unbounded in-process channel implementing both sides of the contract.
///
/// Messages are queued until a single subscriber drains them. Bodies go
/// through the same JSON encoding as the AMQP publisher.
///
/// # Example
///
/// ```
/// use calendar_broker::InMemoryChannel;
///
/// let channel = InMemoryChannel::new();
/// assert_eq!(channel.acked(), 0);
/// ```
pub struct InMemoryChannel {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    published: AtomicU64,
    acked: AtomicU64,
    closed: AtomicBool,
    stopped: AtomicBool,
    stop_signal: Notify,
}

impl Default for InMemoryChannel {
    fn default() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            published: AtomicU64::new(0),
            acked: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            stop_signal: Notify::new(),
        }
    }
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience for sharing one channel between publisher and subscriber
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Queue a raw body, bypassing JSON encoding
    pub fn publish_raw(&self, body: impl Into<Vec<u8>>) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        self.tx.send(body.into()).map_err(|_| BrokerError::Closed)?;
        self.published.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Messages accepted by `publish`/`publish_raw`
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }

    /// Messages acknowledged by the subscriber
    pub fn acked(&self) -> u64 {
        self.acked.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn take_receiver(&self) -> Result<mpsc::UnboundedReceiver<Vec<u8>>> {
        self.rx
            .lock()
            .take()
            .ok_or_else(|| BrokerError::Consume("channel already has a subscriber".to_string()))
    }
}

#[async_trait]
impl NotificationPublisher for InMemoryChannel {
    async fn publish(&self, notification: &Notification) -> Result<()> {
        let body = encode_notification(notification)?;
        self.publish_raw(body)?;
        debug!(event_id = %notification.event_id, "queued notification");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl Subscriber for InMemoryChannel {
    async fn subscribe(
        &self,
        handler: Arc<dyn MessageHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        let mut rx = self.take_receiver()?;

        loop {
            tokio::select! {
                body = rx.recv() => {
                    let Some(body) = body else {
                        debug!("in-memory channel drained");
                        break;
                    };
                    if let Err(e) = handler.handle(&body).await {
                        warn!(error = %e, "handler failed, acknowledging anyway");
                    }
                    self.acked.fetch_add(1, Ordering::SeqCst);
                }
                _ = shutdown.changed() => {
                    debug!("subscriber: shutdown requested");
                    break;
                }
                _ = self.stop_signal.notified() => {
                    debug!("subscriber: stopped");
                    break;
                }
            }
        }

        // Hand the receiver back so undelivered messages survive a restart
        *self.rx.lock() = Some(rx);
        Ok(())
    }

    /// Cancel the subscriber and refuse further publishes. Independent of
    /// `NotificationPublisher::close`, which only ends the producing side.
    async fn stop(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.closed.store(true, Ordering::SeqCst);
        self.stop_signal.notify_one();
        Ok(())
    }
}
