//! Measurement ingestion subsystem.
//!
//! # Data Flow
//! ```text
//! broker deliveries
//!     → driver.rs (subscribe, push raw bodies)
//!     → queue.rs (mutex FIFO, optional bound)
//!     → processor.rs (decode message.rs, incr store counter)
//!
//! pipeline.rs spawns driver, health monitor and processor, joins them in
//! that order: processor, driver, monitor.
//! ```
//!
//! # Design Decisions
//! - Delivery path never blocks; a full bounded queue drops the newest
//! - Bad payloads and store errors are logged and dropped per message
//! - Final drain only starts after the subscription is cancelled

pub mod driver;
pub mod message;
pub mod pipeline;
pub mod processor;
pub mod queue;

pub use message::{InboundMessage, Measurement};
pub use pipeline::{Pipeline, PipelineError, PipelineReport, PipelineSettings};
pub use processor::{MessageProcessor, ProcessorReport, ProcessorSettings};
pub use queue::{QueueFull, SharedQueue};
