//! AMQP 0-9-1 broker adapter backed by `lapin`.
//!
//! # Responsibilities
//! - Open one connection and one channel
//! - Consume a queue without acks and expose deliveries as a stream
//! - Publish, cancel and close on the same channel
//!
//! lapin runs its I/O and protocol heartbeats on the tokio runtime it is
//! handed, so the probe here only inspects connection and channel state.

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};

use crate::broker::{Broker, BrokerError, BrokerResult, Subscription};
use crate::config::BrokerEndpoint;
use crate::ingest::message::InboundMessage;

const REPLY_SUCCESS: u16 = 200;

/// Connection properties that schedule lapin's internals on the current
/// tokio runtime instead of its default thread pool.
fn connection_properties() -> ConnectionProperties {
    ConnectionProperties::default()
        .with_executor(tokio_executor_trait::Tokio::current())
        .with_reactor(tokio_reactor_trait::Tokio)
}

/// Broker connection over AMQP.
pub struct AmqpBroker {
    connection: Connection,
    channel: Channel,
    host: String,
}

impl AmqpBroker {
    /// Connect and open a channel.
    pub async fn connect(endpoint: &BrokerEndpoint) -> BrokerResult<Self> {
        let connection = Connection::connect(&endpoint.uri(), connection_properties())
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Connect(e.to_string()))?;

        tracing::info!(host = endpoint.host(), "Connected to broker");

        Ok(Self {
            connection,
            channel,
            host: endpoint.host().to_string(),
        })
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn subscribe(&self, queue: &str) -> BrokerResult<Subscription> {
        let options = BasicConsumeOptions {
            no_ack: true,
            ..Default::default()
        };

        let consumer = self
            .channel
            .basic_consume(queue, "", options, FieldTable::default())
            .await
            .map_err(|e| BrokerError::Subscribe {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;

        let consumer_tag = consumer.tag().as_str().to_string();
        let deliveries = consumer
            .map(|result| match result {
                Ok(mut delivery) => Ok(InboundMessage::new(
                    std::mem::take(&mut delivery.data),
                    delivery.delivery_tag,
                    delivery.redelivered,
                )),
                Err(e) => Err(BrokerError::Consume(e.to_string())),
            })
            .boxed();

        Ok(Subscription {
            consumer_tag,
            deliveries,
        })
    }

    async fn cancel(&self, consumer_tag: &str) -> BrokerResult<()> {
        self.channel
            .basic_cancel(consumer_tag, BasicCancelOptions::default())
            .await
            .map_err(|e| BrokerError::Cancel {
                tag: consumer_tag.to_string(),
                reason: e.to_string(),
            })
    }

    async fn heartbeat(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }

    async fn publish(&self, exchange: &str, routing_key: &str, payload: &[u8]) -> BrokerResult<()> {
        let confirm = self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default(),
            )
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;

        // Without publisher confirms enabled this resolves immediately.
        confirm
            .await
            .map_err(|e| BrokerError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> BrokerResult<()> {
        if self.channel.status().connected() {
            self.channel
                .close(REPLY_SUCCESS, "OK")
                .await
                .map_err(|e| BrokerError::Close(e.to_string()))?;
        }
        if self.connection.status().connected() {
            self.connection
                .close(REPLY_SUCCESS, "OK")
                .await
                .map_err(|e| BrokerError::Close(e.to_string()))?;
        }
        tracing::info!(host = %self.host, "Broker connection closed");
        Ok(())
    }
}
