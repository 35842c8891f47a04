//! Broker connection health.
//!
//! # Data Flow
//! ```text
//! Monitor loop (monitor.rs):
//!     200 ms tick → phase check
//!     every 10th tick → heartbeat probe → state.rs
//!
//! Failure streak (state.rs):
//!     consecutive failures > threshold → ShutdownSignal::Draining
//!
//! Shutdown handover:
//!     Draining → cancel subscription (bounded wait) → Finalizing
//! ```
//!
//! # Design Decisions
//! - The monitor owns the first shutdown step so intake stops before the
//!   final drain starts
//! - A slow or missing cancel acknowledgment never blocks shutdown

pub mod monitor;
pub mod state;

pub use monitor::{CancelOutcome, HealthMonitor, HeartbeatConfig, MonitorReport};
pub use state::HeartbeatState;
