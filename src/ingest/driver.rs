//! Ingestion driver: broker deliveries into the shared queue.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::broadcast;

use crate::broker::{Broker, SubscriptionHandle};
use crate::ingest::queue::SharedQueue;
use crate::observability::metrics;

/// Delivery totals for one driver run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverReport {
    /// Deliveries placed on the queue.
    pub enqueued: u64,
    /// Deliveries refused by a full queue.
    pub rejected: u64,
    /// Errors surfaced by the delivery stream.
    pub errors: u64,
    /// Subscribe succeeded.
    pub subscribed: bool,
}

pub struct IngestionDriver {
    broker: Arc<dyn Broker>,
    queue: Arc<SharedQueue>,
    subscription: SubscriptionHandle,
    queue_name: String,
}

impl IngestionDriver {
    pub fn new(
        broker: Arc<dyn Broker>,
        queue: Arc<SharedQueue>,
        subscription: SubscriptionHandle,
        queue_name: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            queue,
            subscription,
            queue_name: queue_name.into(),
        }
    }

    /// Subscribe and feed deliveries into the queue until `stop` fires.
    ///
    /// The driver keeps waiting for `stop` after the delivery stream ends, so
    /// the event loop only goes away once the processor has finished.
    pub async fn run(self, mut stop: broadcast::Receiver<()>) -> DriverReport {
        let mut report = DriverReport::default();

        let result = tokio::select! {
            result = self.broker.subscribe(&self.queue_name) => result,
            _ = stop.recv() => return report,
        };
        let mut subscription = match result {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::error!(queue = %self.queue_name, error = %e, "Error while fetching queue");
                let _ = stop.recv().await;
                return report;
            }
        };

        report.subscribed = true;
        self.subscription.set(subscription.consumer_tag.clone());
        tracing::info!(
            queue = %self.queue_name,
            consumer_tag = %subscription.consumer_tag,
            "Subscribed to queue"
        );

        let mut stream_open = true;
        loop {
            tokio::select! {
                delivery = subscription.deliveries.next(), if stream_open => match delivery {
                    Some(Ok(message)) => match self.queue.push(message) {
                        Ok(()) => {
                            report.enqueued += 1;
                            metrics::record_queue_depth(self.queue.len());
                        }
                        Err(full) => {
                            report.rejected += 1;
                            metrics::record_queue_rejected();
                            tracing::warn!(
                                capacity = full.capacity,
                                delivery_tag = full.message.delivery_tag,
                                "Queue full, delivery dropped"
                            );
                        }
                    },
                    Some(Err(e)) => {
                        report.errors += 1;
                        tracing::error!(queue = %self.queue_name, error = %e, "Error while fetching queue");
                    }
                    None => {
                        tracing::info!(queue = %self.queue_name, "Delivery stream ended");
                        stream_open = false;
                    }
                },
                _ = stop.recv() => break,
            }
        }

        tracing::info!(
            enqueued = report.enqueued,
            rejected = report.rejected,
            "Ingestion stopped"
        );
        report
    }
}
