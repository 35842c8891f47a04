//! Shared FIFO between the delivery path and the message processor.
//!
//! # Design Decisions
//! - One mutex around a `VecDeque`; push and pop are O(1) under the lock
//! - No blocking pop: an empty queue returns `None` and the caller backs off
//! - Unbounded unless a capacity is given; a full queue hands the message back

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::ingest::message::InboundMessage;

/// Push refused because the queue is at capacity.
#[derive(Debug, Error)]
#[error("queue is full ({capacity} messages)")]
pub struct QueueFull {
    pub capacity: usize,
    /// The message that did not fit.
    pub message: InboundMessage,
}

/// Mutex-protected FIFO of inbound messages.
#[derive(Debug, Default)]
pub struct SharedQueue {
    inner: Mutex<VecDeque<InboundMessage>>,
    capacity: Option<usize>,
}

impl SharedQueue {
    /// Create an unbounded queue.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Create a queue that holds at most `capacity` messages.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: Some(capacity),
        }
    }

    /// Create from an optional capacity.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(n) => Self::bounded(n),
            None => Self::unbounded(),
        }
    }

    // A panic elsewhere cannot leave the deque half-updated, so a poisoned
    // lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, VecDeque<InboundMessage>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the tail.
    pub fn push(&self, message: InboundMessage) -> Result<(), QueueFull> {
        let mut queue = self.lock();
        if let Some(capacity) = self.capacity {
            if queue.len() >= capacity {
                return Err(QueueFull { capacity, message });
            }
        }
        queue.push_back(message);
        Ok(())
    }

    /// Remove and return the head, `None` when empty.
    pub fn try_pop(&self) -> Option<InboundMessage> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
