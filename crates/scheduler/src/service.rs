// Scheduler service lifecycle
//
// Idle -> Connecting -> Running -> Draining -> Stopped
//
// Decision: stop() never waits on a tick longer than SHUTDOWN_TIMEOUT
// Decision: stop() is idempotent and safe to race with a running tick

use std::sync::Arc;

use calendar_broker::{AmqpPublisher, BrokerConfig, NotificationPublisher};
use calendar_core::shutdown::{bounded, SHUTDOWN_TIMEOUT};
use calendar_core::{EventStore, StorageBackend, StorageConfig};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::scheduler::{Scheduler, SchedulerError};

/// Scheduler service status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerStatus {
    /// Created, nothing opened yet
    Idle,
    /// Opening the event store and the broker connection
    Connecting,
    /// Timer loop is running
    Running,
    /// Stop requested, releasing resources
    Draining,
    /// Stopped; cannot be restarted
    Stopped,
}

/// Owns the scheduler loop task and the resources it uses
pub struct SchedulerService {
    config: SchedulerConfig,
    status: RwLock<SchedulerStatus>,
    shutdown_tx: watch::Sender<bool>,
    store: Mutex<Option<Arc<dyn EventStore>>>,
    publisher: Mutex<Option<Arc<dyn NotificationPublisher>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SchedulerService {
    pub fn new(config: SchedulerConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            config,
            status: RwLock::new(SchedulerStatus::Idle),
            shutdown_tx,
            store: Mutex::new(None),
            publisher: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        *self.status.read()
    }

    /// Open the configured store and an AMQP publisher, then start the loop.
    ///
    /// Any failure is returned as-is and leaves the service Stopped.
    pub async fn start(
        &self,
        storage: &StorageConfig,
        broker: BrokerConfig,
    ) -> Result<(), SchedulerError> {
        self.transition(SchedulerStatus::Idle, SchedulerStatus::Connecting)?;

        let store = match StorageBackend::from_config(storage).await {
            Ok(backend) => backend.store(),
            Err(e) => {
                *self.status.write() = SchedulerStatus::Stopped;
                return Err(e.into());
            }
        };

        let publisher = match AmqpPublisher::connect(broker).await {
            Ok(publisher) => publisher,
            Err(e) => {
                bounded("Event store close", store.close()).await;
                *self.status.write() = SchedulerStatus::Stopped;
                return Err(e.into());
            }
        };

        let publisher: Arc<dyn NotificationPublisher> = Arc::new(publisher);
        if !self.launch(store.clone(), publisher.clone()) {
            // stop() ran while connecting
            if let Some(Err(e)) = bounded("Publisher close", publisher.close()).await {
                error!("Failed to close publisher: {}", e);
            }
            bounded("Event store close", store.close()).await;
        }
        Ok(())
    }

    /// Start the loop over already opened resources.
    pub fn start_with(
        &self,
        store: Arc<dyn EventStore>,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> Result<(), SchedulerError> {
        self.transition(SchedulerStatus::Idle, SchedulerStatus::Connecting)?;
        if !self.launch(store, publisher) {
            return Err(SchedulerError::InvalidState(self.status()));
        }
        Ok(())
    }

    fn transition(
        &self,
        from: SchedulerStatus,
        to: SchedulerStatus,
    ) -> Result<(), SchedulerError> {
        let mut status = self.status.write();
        if *status != from {
            return Err(SchedulerError::InvalidState(*status));
        }
        *status = to;
        Ok(())
    }

    /// Spawn the loop unless a stop arrived while connecting.
    fn launch(
        &self,
        store: Arc<dyn EventStore>,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> bool {
        let mut status = self.status.write();
        if *status != SchedulerStatus::Connecting {
            return false;
        }

        let scheduler = Scheduler::new(store.clone(), publisher.clone(), self.config.clone());
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

        *self.store.lock() = Some(store);
        *self.publisher.lock() = Some(publisher);
        *self.handle.lock() = Some(handle);
        *status = SchedulerStatus::Running;
        info!("Scheduler started");
        true
    }

    /// Stop the loop and release the publisher and store.
    ///
    /// Later calls return immediately.
    pub async fn stop(&self) {
        {
            let mut status = self.status.write();
            match *status {
                SchedulerStatus::Draining | SchedulerStatus::Stopped => return,
                SchedulerStatus::Idle => {
                    *status = SchedulerStatus::Stopped;
                    return;
                }
                SchedulerStatus::Connecting | SchedulerStatus::Running => {
                    *status = SchedulerStatus::Draining;
                }
            }
        }
        info!("Scheduler draining");

        // Stored even when no loop is listening yet
        self.shutdown_tx.send_replace(true);

        let publisher = self.publisher.lock().take();
        if let Some(publisher) = publisher {
            if let Some(Err(e)) = bounded("Publisher close", publisher.close()).await {
                error!("Failed to close publisher: {}", e);
            }
        }

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Scheduler loop panicked: {}", e),
                Err(_) => warn!(
                    timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
                    "Scheduler loop did not stop in time"
                ),
            }
        }

        let store = self.store.lock().take();
        if let Some(store) = store {
            bounded("Event store close", store.close()).await;
        }

        *self.status.write() = SchedulerStatus::Stopped;
        info!("Scheduler stopped");
    }
}
