//! Heartbeat failure tracking.
//!
//! # State Transitions
//! ```text
//! probe ok     → failures = 0
//! probe failed → failures += 1
//! failures > threshold → exceeded (monitor initiates shutdown)
//! ```

/// Consecutive-failure counter with a fixed threshold.
///
/// Owned by the monitor task; nothing else reads or writes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatState {
    consecutive_failures: u32,
    threshold: u32,
}

impl HeartbeatState {
    pub fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold,
        }
    }

    /// Report a successful probe.
    pub fn mark_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Report a failed probe. Returns the failure streak after this one.
    pub fn mark_failure(&mut self) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_failures
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// True once the streak is strictly above the threshold.
    pub fn exceeded(&self) -> bool {
        self.consecutive_failures() > self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_strict() {
        let mut state = HeartbeatState::new(3);
        for expected in 1..=3 {
            assert_eq!(state.mark_failure(), expected);
            assert!(!state.exceeded());
        }
        state.mark_failure();
        assert!(state.exceeded());
    }

    #[test]
    fn test_success_resets_streak() {
        let mut state = HeartbeatState::new(1);
        state.mark_failure();
        state.mark_success();
        assert_eq!(state.consecutive_failures(), 0);
        state.mark_failure();
        assert!(!state.exceeded());
    }

    #[test]
    fn test_streak_saturates() {
        let mut state = HeartbeatState {
            consecutive_failures: u32::MAX - 1,
            threshold: 3,
        };
        assert_eq!(state.mark_failure(), u32::MAX);
        assert_eq!(state.mark_failure(), u32::MAX);
        assert!(state.exceeded());
    }
}
