//! Stop coordination for the ingestion event loop.

use tokio::sync::broadcast;

/// Tells the ingestion event loop to stop.
///
/// The message processor fires it once the final drain is done. Anything
/// that drives connection I/O subscribes and exits when it fires.
#[derive(Clone)]
pub struct EventLoopStop {
    tx: broadcast::Sender<()>,
}

impl EventLoopStop {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver that fires on the next [`trigger`](Self::trigger).
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Ask the event loop to stop.
    ///
    /// Returns how many listeners were notified; zero means the loop had
    /// already exited.
    pub fn trigger(&self) -> usize {
        let listeners = self.tx.send(()).unwrap_or(0);
        tracing::debug!(listeners, "Stopping event loop");
        listeners
    }
}

impl Default for EventLoopStop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_subscribers() {
        let stop = EventLoopStop::new();
        let mut a = stop.subscribe();
        let mut b = stop.subscribe();

        assert_eq!(stop.trigger(), 2);
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[test]
    fn test_trigger_after_loop_exit_notifies_nobody() {
        let stop = EventLoopStop::new();
        assert_eq!(stop.trigger(), 0);

        let rx = stop.subscribe();
        drop(rx);
        assert_eq!(stop.trigger(), 0);
    }
}
