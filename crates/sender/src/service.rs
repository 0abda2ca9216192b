// Sender service lifecycle
//
// Idle -> Connecting -> Consuming -> Stopped
//
// Decision: run() owns the consume loop; stop() only signals and cancels the consumer
// Decision: stop() is idempotent

use std::sync::Arc;

use calendar_broker::{AmqpConsumer, BrokerConfig, BrokerError, MessageHandler, Subscriber};
use calendar_core::shutdown::bounded;
use calendar_core::{EventStore, StorageBackend, StorageConfig, StoreError};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{error, info};

use crate::handler::NotificationHandler;

/// Sender service status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderStatus {
    /// Created, nothing opened yet
    Idle,
    /// Opening the event store and the broker connection
    Connecting,
    /// Receiving messages
    Consuming,
    /// Consumption ended; cannot be restarted
    Stopped,
}

/// Sender errors
#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("sender cannot run from state {0:?}")]
    InvalidState(SenderStatus),
}

/// Runs the notification consumer against the event store
pub struct SenderService {
    status: RwLock<SenderStatus>,
    shutdown_tx: watch::Sender<bool>,
    subscriber: Mutex<Option<Arc<dyn Subscriber>>>,
}

impl Default for SenderService {
    fn default() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            status: RwLock::new(SenderStatus::Idle),
            shutdown_tx,
            subscriber: Mutex::new(None),
        }
    }
}

impl SenderService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SenderStatus {
        *self.status.read()
    }

    /// Open the configured store and an AMQP consumer, then consume until
    /// the delivery stream closes or `stop` is called.
    ///
    /// Connection failures are returned and leave the service Stopped.
    pub async fn run(
        &self,
        storage: &StorageConfig,
        broker: BrokerConfig,
    ) -> Result<(), SenderError> {
        self.begin()?;

        let store = match StorageBackend::from_config(storage).await {
            Ok(backend) => backend.store(),
            Err(e) => {
                self.finish();
                return Err(e.into());
            }
        };

        let consumer = match AmqpConsumer::connect(broker).await {
            Ok(consumer) => consumer,
            Err(e) => {
                bounded("Event store close", store.close()).await;
                self.finish();
                return Err(e.into());
            }
        };
        info!(consumer_tag = %consumer.consumer_tag(), "AMQP consumer ready");

        self.consume(store, Arc::new(consumer)).await
    }

    /// Consume with already opened resources.
    pub async fn run_with(
        &self,
        store: Arc<dyn EventStore>,
        subscriber: Arc<dyn Subscriber>,
    ) -> Result<(), SenderError> {
        self.begin()?;
        self.consume(store, subscriber).await
    }

    fn begin(&self) -> Result<(), SenderError> {
        let mut status = self.status.write();
        if *status != SenderStatus::Idle {
            return Err(SenderError::InvalidState(*status));
        }
        *status = SenderStatus::Connecting;
        Ok(())
    }

    fn finish(&self) {
        *self.status.write() = SenderStatus::Stopped;
    }

    async fn consume(
        &self,
        store: Arc<dyn EventStore>,
        subscriber: Arc<dyn Subscriber>,
    ) -> Result<(), SenderError> {
        let shutdown_rx = self.shutdown_tx.subscribe();
        // stop() may have run while connecting
        if *shutdown_rx.borrow() {
            Self::release(store, subscriber).await;
            self.finish();
            return Ok(());
        }

        *self.subscriber.lock() = Some(subscriber.clone());
        *self.status.write() = SenderStatus::Consuming;
        info!("Sender consuming notifications");

        let handler: Arc<dyn MessageHandler> = Arc::new(NotificationHandler::new(store.clone()));
        let result = subscriber.subscribe(handler, shutdown_rx).await;

        // Consumption may also end because the broker closed the stream
        let subscriber = self.subscriber.lock().take();
        if let Some(subscriber) = subscriber {
            Self::stop_subscriber(subscriber.as_ref()).await;
        }
        bounded("Event store close", store.close()).await;
        self.finish();
        info!("Sender stopped");

        result.map_err(SenderError::from)
    }

    /// Ask the consume loop to end and cancel the consumer. Later calls are no-ops.
    pub async fn stop(&self) {
        {
            let mut status = self.status.write();
            match *status {
                SenderStatus::Stopped => return,
                SenderStatus::Idle => {
                    *status = SenderStatus::Stopped;
                    return;
                }
                SenderStatus::Connecting | SenderStatus::Consuming => {}
            }
        }

        // Stored even when no loop is listening yet
        self.shutdown_tx.send_replace(true);

        let subscriber = self.subscriber.lock().take();
        if let Some(subscriber) = subscriber {
            Self::stop_subscriber(subscriber.as_ref()).await;
        }
    }

    async fn stop_subscriber(subscriber: &dyn Subscriber) {
        if let Some(Err(e)) = bounded("Consumer stop", subscriber.stop()).await {
            error!("Failed to stop consumer: {}", e);
        }
    }

    async fn release(store: Arc<dyn EventStore>, subscriber: Arc<dyn Subscriber>) {
        Self::stop_subscriber(subscriber.as_ref()).await;
        bounded("Event store close", store.close()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use calendar_core::shutdown::SHUTDOWN_TIMEOUT;
    use calendar_core::InMemoryEventStore;
    use std::time::Duration;

    /// Subscriber that idles until shutdown and whose stop never completes
    struct StalledSubscriber;

    #[async_trait]
    impl Subscriber for StalledSubscriber {
        async fn subscribe(
            &self,
            _handler: Arc<dyn MessageHandler>,
            mut shutdown: watch::Receiver<bool>,
        ) -> Result<(), BrokerError> {
            let _ = shutdown.wait_for(|stop| *stop).await;
            Ok(())
        }

        async fn stop(&self) -> Result<(), BrokerError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_bounded_when_consumer_stop_stalls() {
        let service = Arc::new(SenderService::new());
        let task = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .run_with(Arc::new(InMemoryEventStore::new()), Arc::new(StalledSubscriber))
                    .await
            })
        };
        while service.status() != SenderStatus::Consuming {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let started = tokio::time::Instant::now();
        service.stop().await;
        task.await.unwrap().unwrap();

        assert_eq!(service.status(), SenderStatus::Stopped);
        assert!(started.elapsed() < SHUTDOWN_TIMEOUT * 2);
    }

    #[tokio::test]
    async fn test_stop_before_run() {
        let service = SenderService::new();
        service.stop().await;
        assert_eq!(service.status(), SenderStatus::Stopped);

        let err = service
            .run_with(
                Arc::new(InMemoryEventStore::new()),
                calendar_broker::InMemoryChannel::shared(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SenderError::InvalidState(SenderStatus::Stopped)));
    }
}
