//! AMQP transport for notifications
//!
//! Topology is one durable direct exchange and one durable queue bound with a
//! single routing key. Publisher and consumer both declare it, so either side
//! can start first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use calendar_core::shutdown::SHUTDOWN_TIMEOUT;
use calendar_core::Notification;
use futures::StreamExt;
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    ExchangeKind,
};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::channel::{encode_notification, MessageHandler, NotificationPublisher, Subscriber};
use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};

const CONTENT_TYPE_JSON: &str = "application/json";
const DELIVERY_MODE_PERSISTENT: u8 = 2;
const REPLY_SUCCESS: u16 = 200;

async fn open_channel(config: &BrokerConfig) -> Result<(Connection, Channel)> {
    let connection = Connection::connect(&config.uri, ConnectionProperties::default())
        .await
        .map_err(|e| BrokerError::Connection(format!("amqp connect: {e}")))?;
    let channel = connection
        .create_channel()
        .await
        .map_err(|e| BrokerError::Connection(format!("amqp channel: {e}")))?;
    declare_topology(&channel, config).await?;
    info!(uri = %config.redacted_uri(), exchange = %config.exchange, queue = %config.queue, "AMQP channel open");
    Ok((connection, channel))
}

async fn declare_topology(channel: &Channel, config: &BrokerConfig) -> Result<()> {
    channel
        .exchange_declare(
            &config.exchange,
            ExchangeKind::Direct,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| BrokerError::Topology(format!("declare exchange {}: {e}", config.exchange)))?;

    channel
        .queue_declare(
            &config.queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| BrokerError::Topology(format!("declare queue {}: {e}", config.queue)))?;

    channel
        .queue_bind(
            &config.queue,
            &config.exchange,
            &config.routing_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| BrokerError::Topology(format!("bind queue {}: {e}", config.queue)))?;

    Ok(())
}

async fn close_connection(connection: &Connection) -> Result<()> {
    if !connection.status().connected() {
        return Ok(());
    }
    tokio::time::timeout(SHUTDOWN_TIMEOUT, connection.close(REPLY_SUCCESS, "OK"))
        .await
        .map_err(|_| BrokerError::Connection("amqp close timed out".to_string()))?
        .map_err(|e| BrokerError::Connection(format!("amqp close: {e}")))
}

/// Publishes notifications to the direct exchange with publisher confirms.
pub struct AmqpPublisher {
    config: BrokerConfig,
    connection: Connection,
    channel: Channel,
    closed: AtomicBool,
}

impl AmqpPublisher {
    /// Connect, declare topology and enable publisher confirms
    pub async fn connect(config: BrokerConfig) -> Result<Self> {
        let (connection, channel) = open_channel(&config).await?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| BrokerError::Connection(format!("enable confirms: {e}")))?;
        Ok(Self {
            config,
            connection,
            channel,
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl NotificationPublisher for AmqpPublisher {
    #[instrument(skip(self, notification), fields(event_id = %notification.event_id))]
    async fn publish(&self, notification: &Notification) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        let body = encode_notification(notification)?;

        let properties = BasicProperties::default()
            .with_content_type(CONTENT_TYPE_JSON.into())
            .with_delivery_mode(DELIVERY_MODE_PERSISTENT);

        let confirmation = self
            .channel
            .basic_publish(
                &self.config.exchange,
                &self.config.routing_key,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?
            .await
            .map_err(|e| BrokerError::Publish(format!("confirm: {e}")))?;

        if confirmation.is_nack() {
            return Err(BrokerError::Publish("broker rejected message".to_string()));
        }

        debug!("published notification");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        close_connection(&self.connection).await
    }
}

/// Consumes the notification queue with manual acknowledgement.
pub struct AmqpConsumer {
    connection: Connection,
    channel: Channel,
    queue: String,
    consumer_tag: String,
    stopped: AtomicBool,
}

impl AmqpConsumer {
    /// Connect and declare topology. Consumption starts with `subscribe`.
    pub async fn connect(config: BrokerConfig) -> Result<Self> {
        let (connection, channel) = open_channel(&config).await?;
        // One unacknowledged message at a time keeps handling sequential
        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::Consume(format!("set prefetch: {e}")))?;
        Ok(Self {
            connection,
            channel,
            queue: config.queue,
            consumer_tag: format!("calendar-sender-{}", Uuid::now_v7()),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn consumer_tag(&self) -> &str {
        &self.consumer_tag
    }
}

#[async_trait]
impl Subscriber for AmqpConsumer {
    #[instrument(skip(self, handler, shutdown), fields(queue = %self.queue, consumer_tag = %self.consumer_tag))]
    async fn subscribe(
        &self,
        handler: Arc<dyn MessageHandler>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }

        let mut consumer = self
            .channel
            .basic_consume(
                &self.queue,
                &self.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::Consume(e.to_string()))?;

        info!("Consuming notifications");

        loop {
            tokio::select! {
                delivery = consumer.next() => {
                    let delivery = match delivery {
                        Some(Ok(delivery)) => delivery,
                        Some(Err(e)) => {
                            if self.stopped.load(Ordering::SeqCst) {
                                break;
                            }
                            error!("Delivery stream failed: {}", e);
                            return Err(BrokerError::Consume(e.to_string()));
                        }
                        None => {
                            debug!("Delivery stream closed");
                            break;
                        }
                    };

                    if let Err(e) = handler.handle(&delivery.data).await {
                        warn!(delivery_tag = delivery.delivery_tag, error = %e, "Handler failed, acknowledging anyway");
                    }

                    if let Err(e) = delivery.acker.ack(BasicAckOptions::default()).await {
                        error!(delivery_tag = delivery.delivery_tag, "{}", BrokerError::Ack(e.to_string()));
                    }
                }
                _ = shutdown.changed() => {
                    debug!("Consumer: shutdown requested");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Err(e) = self
            .channel
            .basic_cancel(&self.consumer_tag, BasicCancelOptions::default())
            .await
        {
            warn!(consumer_tag = %self.consumer_tag, "Failed to cancel consumer: {}", e);
        }

        close_connection(&self.connection).await
    }
}
