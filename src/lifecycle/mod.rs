//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Read credentials → Connect broker → Connect store
//!     any failure → distinct exit code
//!
//! Shutdown (phase.rs, shutdown.rs):
//!     Running → Draining → Finalizing → final drain → EventLoopStop → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Draining
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then connections, then tasks
//! - Ordered shutdown: stop intake, drain, close
//! - Phases only move forward

pub mod phase;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use phase::{Phase, ShutdownSignal};
pub use shutdown::EventLoopStop;
