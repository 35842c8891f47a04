//! Connection health monitor.
//!
//! # Responsibilities
//! - Periodically probe the broker connection
//! - Start the shutdown path when too many probes fail in a row
//! - Cancel the subscription once shutdown begins, then hand over to the
//!   processor's final drain

use std::sync::Arc;
use std::time::Duration;

use tokio::time;

use crate::broker::{Broker, SubscriptionHandle};
use crate::config::schema::DEFAULT_HEARTBEAT_THRESHOLD;
use crate::health::state::HeartbeatState;
use crate::lifecycle::{Phase, ShutdownSignal};
use crate::observability::metrics;

/// Timing and threshold settings for the monitor.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Granularity at which the shutdown phase is checked.
    pub tick: Duration,
    /// Ticks between two heartbeat probes.
    pub ticks_per_probe: u32,
    /// Consecutive failures tolerated; one more starts shutdown.
    pub failure_threshold: u32,
    /// A probe slower than this counts as failed.
    pub probe_timeout: Duration,
    /// How long to wait for the broker to acknowledge a cancel.
    pub cancel_ack_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(200),
            ticks_per_probe: 10,
            failure_threshold: DEFAULT_HEARTBEAT_THRESHOLD,
            probe_timeout: Duration::from_secs(1),
            cancel_ack_timeout: Duration::from_secs(1),
        }
    }
}

/// How the subscription cancel went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Nothing was subscribed.
    NoSubscription,
    /// Broker acknowledged the cancel.
    Acknowledged,
    /// No acknowledgment within the timeout.
    TimedOut,
    /// Broker refused the cancel.
    Failed,
}

/// Summary of one monitor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorReport {
    pub probes: u32,
    pub consecutive_failures: u32,
    pub cancel: CancelOutcome,
}

pub struct HealthMonitor {
    broker: Arc<dyn Broker>,
    subscription: SubscriptionHandle,
    config: HeartbeatConfig,
    state: HeartbeatState,
}

impl HealthMonitor {
    pub fn new(
        broker: Arc<dyn Broker>,
        subscription: SubscriptionHandle,
        config: HeartbeatConfig,
    ) -> Self {
        let state = HeartbeatState::new(config.failure_threshold);
        Self {
            broker,
            subscription,
            config,
            state,
        }
    }

    /// Run until the subscription has been cancelled and `Finalizing` reached.
    pub async fn run(mut self, shutdown: ShutdownSignal) -> MonitorReport {
        tracing::info!(
            tick_ms = self.config.tick.as_millis() as u64,
            ticks_per_probe = self.config.ticks_per_probe,
            threshold = self.config.failure_threshold,
            "Health monitor starting"
        );

        let mut probes = 0;
        let mut ticks = 0;

        loop {
            if shutdown.phase() >= Phase::Draining {
                let cancel = self.cancel_subscription().await;
                shutdown.advance(Phase::Finalizing);
                tracing::info!(probes, cancel = ?cancel, "Health monitor exiting");
                return MonitorReport {
                    probes,
                    consecutive_failures: self.state.consecutive_failures(),
                    cancel,
                };
            }

            tokio::select! {
                _ = time::sleep(self.config.tick) => {}
                _ = shutdown.reached(Phase::Draining) => continue,
            }

            ticks += 1;
            if ticks < self.config.ticks_per_probe {
                continue;
            }
            ticks = 0;

            probes += 1;
            self.probe(&shutdown).await;
        }
    }

    async fn probe(&mut self, shutdown: &ShutdownSignal) {
        let healthy = match time::timeout(self.config.probe_timeout, self.broker.heartbeat()).await {
            Ok(healthy) => healthy,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.probe_timeout.as_millis() as u64,
                    "Heartbeat timed out"
                );
                false
            }
        };

        if healthy {
            self.state.mark_success();
            metrics::record_heartbeat(true, 0);
            tracing::debug!("Heartbeat ok");
            return;
        }

        let failures = self.state.mark_failure();
        metrics::record_heartbeat(false, failures);
        tracing::warn!(
            consecutive_failures = failures,
            threshold = self.state.threshold(),
            "Heartbeat failed"
        );

        if self.state.exceeded() {
            tracing::error!(
                consecutive_failures = failures,
                "Heartbeat failure threshold exceeded, initiating exit"
            );
            shutdown.advance(Phase::Draining);
        }
    }

    async fn cancel_subscription(&self) -> CancelOutcome {
        let Some(tag) = self.subscription.get() else {
            tracing::info!("No active subscription to cancel");
            return CancelOutcome::NoSubscription;
        };

        tracing::info!(consumer_tag = tag, "Cancelling subscription");
        match time::timeout(self.config.cancel_ack_timeout, self.broker.cancel(tag)).await {
            Ok(Ok(())) => {
                tracing::info!(consumer_tag = tag, "Subscription cancelled");
                CancelOutcome::Acknowledged
            }
            Ok(Err(e)) => {
                tracing::warn!(consumer_tag = tag, error = %e, "Cancel request failed");
                CancelOutcome::Failed
            }
            Err(_) => {
                tracing::warn!(
                    consumer_tag = tag,
                    timeout_ms = self.config.cancel_ack_timeout.as_millis() as u64,
                    "Cancel not acknowledged in time, continuing shutdown"
                );
                CancelOutcome::TimedOut
            }
        }
    }
}
