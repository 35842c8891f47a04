//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ddc_messages_total` (counter): processed messages by outcome
//! - `ddc_queue_rejected_total` (counter): deliveries refused by a bounded queue
//! - `ddc_queue_depth` (gauge): messages waiting in the shared queue
//! - `ddc_heartbeat_failures` (gauge): current consecutive heartbeat failures
//! - `ddc_heartbeats_total` (counter): heartbeat probes by result
//! - `ddc_shutdown_phase` (gauge): 0=running, 1=draining, 2=finalizing
//! - `ddc_published_total` (counter): publisher lines by result
//!
//! Recording is a no-op until a recorder is installed, so library code and
//! tests can call these freely.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::lifecycle::Phase;

/// Install the Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Outcome of handling one inbound message.
pub fn record_message(outcome: &'static str) {
    ::metrics::counter!("ddc_messages_total", "outcome" => outcome).increment(1);
}

pub fn record_queue_rejected() {
    ::metrics::counter!("ddc_queue_rejected_total").increment(1);
}

pub fn record_queue_depth(depth: usize) {
    ::metrics::gauge!("ddc_queue_depth").set(depth as f64);
}

/// Result of one heartbeat probe and the failure streak after it.
pub fn record_heartbeat(healthy: bool, consecutive_failures: u32) {
    let result = if healthy { "ok" } else { "failed" };
    ::metrics::counter!("ddc_heartbeats_total", "result" => result).increment(1);
    ::metrics::gauge!("ddc_heartbeat_failures").set(consecutive_failures as f64);
}

pub fn record_shutdown_phase(phase: Phase) {
    ::metrics::gauge!("ddc_shutdown_phase").set(phase as u8 as f64);
}

pub fn record_published(ok: bool) {
    let result = if ok { "sent" } else { "failed" };
    ::metrics::counter!("ddc_published_total", "result" => result).increment(1);
}
