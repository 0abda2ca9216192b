// Notification Message Channel
//
// Durable publish/subscribe for Notification messages.
//
// Key design decisions:
// - NotificationPublisher / Subscriber / MessageHandler traits keep services transport-agnostic
// - AMQP: one durable direct exchange, one durable queue, one routing key
// - Publishes wait for publisher confirms; there is no retry
// - Consumers ack after the handler returns whatever the outcome (at-least-once delivery,
//   idempotence lives in the event store)

pub mod amqp;
pub mod channel;
pub mod config;
pub mod error;
pub mod memory;

pub use amqp::{AmqpConsumer, AmqpPublisher};
pub use channel::{
    decode_notification, encode_notification, MessageHandler, NotificationPublisher, Subscriber,
};
pub use config::BrokerConfig;
pub use error::{BrokerError, HandlerError, Result};
pub use memory::InMemoryChannel;
