//! Tri-state shutdown signal shared by every pipeline task.
//!
//! # States
//! ```text
//! Running ──(SIGINT/SIGTERM or heartbeat threshold)──▶ Draining
//! Draining ──(subscription cancel requested)──────────▶ Finalizing
//! ```
//!
//! # Design Decisions
//! - Backed by a `watch` channel so readers see the latest phase without locking
//! - `advance` only moves forward, one phase at a time; stale or repeated requests are ignored
//! - Transitions are counted so a run can be audited afterwards

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::observability::metrics;

/// Observable shutdown stage.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Normal operation: intake and processing.
    Running = 0,
    /// Intake is being stopped; the processor holds off the final drain.
    Draining = 1,
    /// Subscription cancelled; the processor drains everything left.
    Finalizing = 2,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Running => write!(f, "running"),
            Phase::Draining => write!(f, "draining"),
            Phase::Finalizing => write!(f, "finalizing"),
        }
    }
}

/// Cloneable handle to the process-wide shutdown phase.
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<Phase>>,
    transitions: Arc<AtomicUsize>,
}

impl ShutdownSignal {
    /// Create a signal in the `Running` phase.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Phase::Running);
        Self {
            tx: Arc::new(tx),
            transitions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        *self.tx.borrow()
    }

    /// Move forward to `target`, one phase at a time.
    ///
    /// Every intermediate phase is published, so `Running → Finalizing`
    /// passes through `Draining`. Returns `true` when this call moved the
    /// phase at least once.
    pub fn advance(&self, target: Phase) -> bool {
        let mut moved = false;
        for step in [Phase::Draining, Phase::Finalizing] {
            if step > target {
                break;
            }
            moved |= self.step_to(step);
        }
        moved
    }

    fn step_to(&self, next: Phase) -> bool {
        let mut from = Phase::Running;
        let moved = self.tx.send_if_modified(|current| {
            if next > *current {
                from = *current;
                *current = next;
                true
            } else {
                false
            }
        });

        if moved {
            self.transitions.fetch_add(1, Ordering::SeqCst);
            metrics::record_shutdown_phase(next);
            tracing::info!(from = %from, to = %next, "Shutdown phase advanced");
        }
        moved
    }

    /// Receiver that observes every phase change.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.tx.subscribe()
    }

    /// Wait until the phase reaches at least `target`.
    pub async fn reached(&self, target: Phase) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|phase| *phase >= target).await;
    }

    /// Number of forward transitions performed so far.
    pub fn transitions(&self) -> usize {
        self.transitions.load(Ordering::SeqCst)
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("phase", &self.phase())
            .field("transitions", &self.transitions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_starts_running() {
        let signal = ShutdownSignal::new();
        assert_eq!(signal.phase(), Phase::Running);
        assert_eq!(signal.transitions(), 0);
    }

    #[test]
    fn test_advance_is_monotonic() {
        let signal = ShutdownSignal::new();

        assert!(signal.advance(Phase::Draining));
        assert!(!signal.advance(Phase::Draining));
        assert!(!signal.advance(Phase::Running));
        assert_eq!(signal.phase(), Phase::Draining);

        assert!(signal.advance(Phase::Finalizing));
        assert!(!signal.advance(Phase::Draining));
        assert!(!signal.advance(Phase::Running));
        assert_eq!(signal.phase(), Phase::Finalizing);

        assert_eq!(signal.transitions(), 2);
    }

    #[test]
    fn test_advance_passes_through_draining() {
        let signal = ShutdownSignal::new();
        let rx = signal.subscribe();

        assert!(signal.advance(Phase::Finalizing));
        assert!(!signal.advance(Phase::Finalizing));
        assert_eq!(signal.phase(), Phase::Finalizing);
        assert_eq!(signal.transitions(), 2);
        assert!(rx.has_changed().unwrap());

        let late = ShutdownSignal::new();
        late.advance(Phase::Draining);
        assert!(late.advance(Phase::Finalizing));
        assert_eq!(late.transitions(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        other.advance(Phase::Draining);
        assert_eq!(signal.phase(), Phase::Draining);
    }

    #[tokio::test]
    async fn test_reached_wakes_waiter() {
        let signal = ShutdownSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.reached(Phase::Finalizing).await })
        };

        signal.advance(Phase::Draining);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        signal.advance(Phase::Finalizing);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[test]
    fn test_concurrent_advance_single_winner() {
        let signal = ShutdownSignal::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let signal = signal.clone();
                std::thread::spawn(move || signal.advance(Phase::Draining))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(signal.transitions(), 1);
    }
}
