//! Message processor with staged shutdown.
//!
//! # Phases
//! ```text
//! Running    → pop, decode, increment; sleep `idle_backoff` when empty
//! Draining   → hold; no queue action until the subscription is cancelled
//! Finalizing → drain until empty without sleeping, then stop the event loop
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::ingest::message::{InboundMessage, Measurement};
use crate::ingest::queue::SharedQueue;
use crate::lifecycle::{EventLoopStop, Phase, ShutdownSignal};
use crate::observability::metrics;
use crate::store::CounterStore;

/// Backoff intervals for the processor loop.
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    /// Sleep after finding the queue empty while running.
    pub idle_backoff: Duration,
    /// Poll interval while waiting for `Finalizing`.
    pub settle_interval: Duration,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            idle_backoff: Duration::from_millis(150),
            settle_interval: Duration::from_millis(100),
        }
    }
}

/// What happened to a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Counted,
    Malformed,
    StoreFailed,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Counted => "counted",
            Outcome::Malformed => "malformed",
            Outcome::StoreFailed => "store_failed",
        }
    }
}

/// Per-run processing totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorReport {
    pub counted: u64,
    pub malformed: u64,
    pub store_failures: u64,
    /// Messages handled by the final drain.
    pub drained: u64,
}

impl ProcessorReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Counted => self.counted += 1,
            Outcome::Malformed => self.malformed += 1,
            Outcome::StoreFailed => self.store_failures += 1,
        }
    }

    /// Messages taken off the queue.
    pub fn total(&self) -> u64 {
        self.counted + self.malformed + self.store_failures
    }
}

/// Pops measurements off the shared queue and counts them per device.
pub struct MessageProcessor {
    store: Arc<dyn CounterStore>,
    settings: ProcessorSettings,
}

impl MessageProcessor {
    pub fn new(store: Arc<dyn CounterStore>, settings: ProcessorSettings) -> Self {
        Self { store, settings }
    }

    /// Run through all three phases, then stop the event loop.
    pub async fn run(
        &self,
        queue: &SharedQueue,
        shutdown: &ShutdownSignal,
        stop: &EventLoopStop,
    ) -> ProcessorReport {
        let mut report = ProcessorReport::default();

        while shutdown.phase() == Phase::Running {
            match queue.try_pop() {
                Some(message) => {
                    let outcome = self.process(&message).await;
                    report.record(outcome);
                    metrics::record_queue_depth(queue.len());
                }
                None => time::sleep(self.settings.idle_backoff).await,
            }
        }

        tracing::info!(pending = queue.len(), "Processor waiting for subscription cancel");
        while shutdown.phase() < Phase::Finalizing {
            time::sleep(self.settings.settle_interval).await;
        }

        let before = report.total();
        while let Some(message) = queue.try_pop() {
            let outcome = self.process(&message).await;
            report.record(outcome);
        }
        report.drained = report.total() - before;
        metrics::record_queue_depth(0);

        tracing::info!(
            drained = report.drained,
            counted = report.counted,
            malformed = report.malformed,
            store_failures = report.store_failures,
            "Final drain complete, stopping event loop"
        );
        stop.trigger();
        report
    }

    /// Decode one message and increment its device counter.
    pub async fn process(&self, message: &InboundMessage) -> Outcome {
        let outcome = match Measurement::decode(&message.body) {
            Ok(measurement) => {
                let key = measurement.counter_key();
                match self.store.incr(&key).await {
                    Ok(count) => {
                        tracing::debug!(
                            device = %measurement.device_id,
                            value = measurement.value,
                            count,
                            "Measurement counted"
                        );
                        Outcome::Counted
                    }
                    Err(e) => {
                        tracing::error!(key = %key, error = %e, "Counter increment failed");
                        Outcome::StoreFailed
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    delivery_tag = message.delivery_tag,
                    bytes = message.body.len(),
                    error = %e,
                    "Dropping malformed message"
                );
                Outcome::Malformed
            }
        };
        metrics::record_message(outcome.as_str());
        outcome
    }

    /// Process everything currently queued.
    pub async fn drain(&self, queue: &SharedQueue) -> ProcessorReport {
        let mut report = ProcessorReport::default();
        while let Some(message) = queue.try_pop() {
            let outcome = self.process(&message).await;
            report.record(outcome);
        }
        report.drained = report.total();
        report
    }
}
