//! Pipeline orchestration: spawn, join, close.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinError;

use crate::broker::{Broker, SubscriptionHandle};
use crate::config::ListenerConfig;
use crate::health::{HealthMonitor, HeartbeatConfig, MonitorReport};
use crate::ingest::driver::{DriverReport, IngestionDriver};
use crate::ingest::processor::{MessageProcessor, ProcessorReport, ProcessorSettings};
use crate::ingest::queue::SharedQueue;
use crate::lifecycle::{EventLoopStop, Phase, ShutdownSignal};
use crate::store::CounterStore;

/// A pipeline task ended abnormally.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{task} task failed: {source}")]
    Task {
        task: &'static str,
        #[source]
        source: JoinError,
    },
}

/// Everything the pipeline needs besides its connections.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub queue_name: String,
    pub queue_capacity: Option<usize>,
    pub heartbeat: HeartbeatConfig,
    pub processor: ProcessorSettings,
}

impl PipelineSettings {
    pub fn new(queue_name: impl Into<String>) -> Self {
        Self {
            queue_name: queue_name.into(),
            queue_capacity: None,
            heartbeat: HeartbeatConfig::default(),
            processor: ProcessorSettings::default(),
        }
    }

    /// Settings for a listener config with default timings.
    pub fn from_config(config: &ListenerConfig) -> Self {
        let mut settings = Self::new(config.queue.clone());
        settings.queue_capacity = config.queue_capacity;
        settings.heartbeat.failure_threshold = config.heartbeat_failure_threshold;
        settings
    }
}

/// Outcome of a complete run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub processor: ProcessorReport,
    pub driver: DriverReport,
    pub monitor: MonitorReport,
    /// Messages handled after the event loop stopped.
    pub residual: ProcessorReport,
}

impl PipelineReport {
    /// Messages counted in total, residual drain included.
    pub fn counted(&self) -> u64 {
        self.processor.counted + self.residual.counted
    }

    /// Malformed messages in total, residual drain included.
    pub fn malformed(&self) -> u64 {
        self.processor.malformed + self.residual.malformed
    }
}

/// Wires the driver, monitor and processor around one broker and store.
pub struct Pipeline {
    broker: Arc<dyn Broker>,
    store: Arc<dyn CounterStore>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        broker: Arc<dyn Broker>,
        store: Arc<dyn CounterStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            broker,
            store,
            settings,
        }
    }

    /// Run until shutdown completes, then close the broker connection.
    ///
    /// Returns once the processor has drained the queue after the
    /// subscription was cancelled.
    pub async fn run(self, shutdown: ShutdownSignal) -> Result<PipelineReport, PipelineError> {
        let queue = Arc::new(SharedQueue::with_capacity(self.settings.queue_capacity));
        let subscription = SubscriptionHandle::new();
        let stop = EventLoopStop::new();

        tracing::info!(
            queue = %self.settings.queue_name,
            capacity = ?self.settings.queue_capacity,
            "Pipeline starting"
        );

        let driver = IngestionDriver::new(
            self.broker.clone(),
            queue.clone(),
            subscription.clone(),
            self.settings.queue_name.clone(),
        );
        let driver_task = tokio::spawn(driver.run(stop.subscribe()));

        let monitor = HealthMonitor::new(
            self.broker.clone(),
            subscription,
            self.settings.heartbeat.clone(),
        );
        let monitor_task = tokio::spawn(monitor.run(shutdown.clone()));

        let processor = Arc::new(MessageProcessor::new(
            self.store.clone(),
            self.settings.processor.clone(),
        ));
        let processor_task = {
            let (processor, queue, shutdown, stop) =
                (processor.clone(), queue.clone(), shutdown.clone(), stop.clone());
            tokio::spawn(async move { processor.run(&queue, &shutdown, &stop).await })
        };

        let processor_report = match processor_task.await {
            Ok(report) => report,
            Err(source) => {
                // Let the other tasks wind down instead of waiting forever.
                shutdown.advance(Phase::Finalizing);
                stop.trigger();
                return Err(PipelineError::Task {
                    task: "processor",
                    source,
                });
            }
        };
        let driver_report = driver_task.await.map_err(|source| PipelineError::Task {
            task: "ingestion",
            source,
        })?;
        let monitor_report = monitor_task.await.map_err(|source| PipelineError::Task {
            task: "health monitor",
            source,
        })?;

        let residual = processor.drain(&queue).await;
        if residual.drained > 0 {
            tracing::info!(residual = residual.drained, "Processed late deliveries");
        }

        if let Err(e) = self.broker.close().await {
            tracing::warn!(error = %e, "Broker close failed");
        }

        tracing::info!(
            counted = processor_report.counted + residual.counted,
            malformed = processor_report.malformed + residual.malformed,
            store_failures = processor_report.store_failures + residual.store_failures,
            "Pipeline finished"
        );

        Ok(PipelineReport {
            processor: processor_report,
            driver: driver_report,
            monitor: monitor_report,
            residual,
        })
    }
}
