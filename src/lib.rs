//! Device measurement ingestion library.
//!
//! Consumes measurement messages from an AMQP queue, counts them per device
//! in a counter store, and shuts down in stages so nothing that reached the
//! in-memory queue is lost.

// Core subsystems
pub mod broker;
pub mod config;
pub mod ingest;
pub mod store;

// Connection health
pub mod health;

// Producers
pub mod publisher;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::{ListenerConfig, PublisherConfig};
pub use ingest::{Pipeline, PipelineSettings};
pub use lifecycle::{Phase, ShutdownSignal};
