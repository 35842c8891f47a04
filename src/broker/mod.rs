//! Message broker integration.
//!
//! # Data Flow
//! ```text
//! AMQP server
//!     → amqp.rs (lapin connection + channel, driven by lapin's own reactor)
//!     → Subscription { consumer_tag, deliveries stream }
//!     → ingest::driver (pushes each delivery into the shared queue)
//!
//! memory.rs mirrors the same contract in-process for tests and demos.
//! ```
//!
//! # Design Decisions
//! - Deliveries are consumed with no-ack; counting is at-most-once
//! - Heartbeat is a cheap liveness probe, never a round trip that can hang
//! - Cancellation is a request; acknowledgment is best-effort

pub mod amqp;
pub mod memory;

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::ingest::message::InboundMessage;

pub use amqp::AmqpBroker;
pub use memory::MemoryBroker;

/// Errors raised by broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Could not open the connection or channel.
    #[error("Broker connection failed: {0}")]
    Connect(String),

    /// Subscribe request was refused.
    #[error("Subscribe to queue '{queue}' failed: {reason}")]
    Subscribe { queue: String, reason: String },

    /// Error surfaced while consuming deliveries.
    #[error("Error while fetching queue: {0}")]
    Consume(String),

    /// Cancel request failed.
    #[error("Cancel of consumer '{tag}' failed: {reason}")]
    Cancel { tag: String, reason: String },

    /// Publish was not accepted.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// Connection close failed.
    #[error("Close failed: {0}")]
    Close(String),
}

/// Result type for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Stream of deliveries for one subscription.
pub type DeliveryStream = BoxStream<'static, BrokerResult<InboundMessage>>;

/// An active subscription.
pub struct Subscription {
    /// Broker-assigned consumer tag.
    pub consumer_tag: String,
    /// Deliveries in arrival order. Ends once the subscription is cancelled.
    pub deliveries: DeliveryStream,
}

/// Operations the pipeline needs from a broker connection.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Start consuming `queue`.
    async fn subscribe(&self, queue: &str) -> BrokerResult<Subscription>;

    /// Ask the broker to cancel a subscription.
    async fn cancel(&self, consumer_tag: &str) -> BrokerResult<()>;

    /// Liveness probe. `false` means the connection looks dead.
    async fn heartbeat(&self) -> bool;

    /// Publish one message.
    async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> BrokerResult<()>;

    /// Close the connection.
    async fn close(&self) -> BrokerResult<()>;
}

/// Write-once holder for the active consumer tag.
///
/// Set by the ingestion driver after subscribe succeeds; read by the health
/// monitor when cancelling. Unset means there is nothing to cancel.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionHandle {
    tag: Arc<OnceLock<String>>,
}

impl SubscriptionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the consumer tag. Returns `false` if one was already set.
    pub fn set(&self, consumer_tag: impl Into<String>) -> bool {
        self.tag.set(consumer_tag.into()).is_ok()
    }

    /// The consumer tag, if a subscription succeeded.
    pub fn get(&self) -> Option<&str> {
        self.tag.get().map(String::as_str)
    }

    pub fn is_set(&self) -> bool {
        self.tag.get().is_some()
    }
}
