//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stderr log stream
//!     → Prometheus scrape endpoint (optional, MetricsAddress)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (device, consumer_tag, phase)
//! - Metrics are cheap and safe to record without an installed exporter

pub mod logging;
pub mod metrics;
