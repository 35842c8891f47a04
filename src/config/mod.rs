//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (key = value lines)
//!     → loader.rs (read & parse into a key map)
//!     → validation.rs (unknown / missing keys)
//!     → schema.rs (typed ListenerConfig / PublisherConfig)
//!     → credentials file → BrokerEndpoint
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; there is no reload
//! - Unknown keys are fatal, so typos never go unnoticed
//! - Validation reports every bad key at once

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigError, ConfigMap, ParseError};
pub use schema::{BrokerEndpoint, ListenerConfig, PublisherConfig};
