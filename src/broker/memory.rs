//! In-process broker with the same contract as the AMQP adapter.
//!
//! Messages are routed by routing key: publishing to `routing_key` delivers
//! to the queue of that name, buffering while nobody consumes it. Heartbeat
//! results can be scripted and cancel acknowledgment can be delayed, which
//! makes the shutdown protocol testable without a server.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::broker::{Broker, BrokerError, BrokerResult, Subscription};
use crate::ingest::message::InboundMessage;

struct Consumer {
    queue: String,
    tx: mpsc::UnboundedSender<InboundMessage>,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, VecDeque<InboundMessage>>,
    consumers: HashMap<String, Consumer>,
    next_delivery_tag: u64,
    cancelled: Vec<String>,
}

/// In-memory broker.
#[derive(Default)]
pub struct MemoryBroker {
    state: Mutex<State>,
    healthy: AtomicBool,
    heartbeat_script: Mutex<VecDeque<bool>>,
    heartbeats: AtomicUsize,
    cancel_delay: Mutex<Option<Duration>>,
    reject_subscribe: AtomicBool,
    reject_publish: AtomicBool,
    closed: AtomicBool,
}

impl MemoryBroker {
    /// A healthy broker with no queues.
    pub fn new() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            ..Default::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Result returned by heartbeats once any script is exhausted.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Queue up heartbeat results, consumed one per probe.
    pub fn script_heartbeats(&self, results: impl IntoIterator<Item = bool>) {
        self.heartbeat_script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(results);
    }

    /// Delay every cancel acknowledgment by `delay`.
    pub fn set_cancel_delay(&self, delay: Duration) {
        *self.cancel_delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    /// Make subscribe requests fail.
    pub fn reject_subscriptions(&self, reject: bool) {
        self.reject_subscribe.store(reject, Ordering::SeqCst);
    }

    /// Make publish requests fail.
    pub fn reject_publishes(&self, reject: bool) {
        self.reject_publish.store(reject, Ordering::SeqCst);
    }

    /// Number of heartbeat probes received.
    pub fn heartbeat_count(&self) -> usize {
        self.heartbeats.load(Ordering::SeqCst)
    }

    /// Consumer tags that were cancelled, in order.
    pub fn cancelled_tags(&self) -> Vec<String> {
        self.state().cancelled.clone()
    }

    /// Messages buffered for `queue` with no consumer attached.
    pub fn pending(&self, queue: &str) -> usize {
        self.state().queues.get(queue).map_or(0, VecDeque::len)
    }

    /// Number of active consumers.
    pub fn consumer_count(&self) -> usize {
        self.state().consumers.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Deliver `body` to `queue` as if it had been routed there.
    pub fn deliver(&self, queue: &str, body: impl Into<Vec<u8>>) {
        let mut state = self.state();
        state.next_delivery_tag += 1;
        let message = InboundMessage::new(body, state.next_delivery_tag, false);

        let consumer = state.consumers.values().find(|c| c.queue == queue);
        let undelivered = match consumer {
            Some(c) => c.tx.send(message).err().map(|e| e.0),
            None => Some(message),
        };
        if let Some(message) = undelivered {
            state
                .queues
                .entry(queue.to_string())
                .or_default()
                .push_back(message);
        }
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn subscribe(&self, queue: &str) -> BrokerResult<Subscription> {
        if self.reject_subscribe.load(Ordering::SeqCst) || self.is_closed() {
            return Err(BrokerError::Subscribe {
                queue: queue.to_string(),
                reason: "subscription refused".to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let consumer_tag = format!("amq.ctag-{}", Uuid::new_v4().simple());

        {
            let mut state = self.state();
            if let Some(backlog) = state.queues.remove(queue) {
                for message in backlog {
                    let _ = tx.send(message);
                }
            }
            state.consumers.insert(
                consumer_tag.clone(),
                Consumer {
                    queue: queue.to_string(),
                    tx,
                },
            );
        }

        let deliveries = stream::unfold(rx, |mut rx| async move {
            rx.recv()
                .await
                .map(|message| (Ok::<_, BrokerError>(message), rx))
        })
        .boxed();

        Ok(Subscription {
            consumer_tag,
            deliveries,
        })
    }

    async fn cancel(&self, consumer_tag: &str) -> BrokerResult<()> {
        let delay = *self.cancel_delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        // Dropping the sender ends the stream once buffered deliveries are read.
        match state.consumers.remove(consumer_tag) {
            Some(_) => {
                state.cancelled.push(consumer_tag.to_string());
                Ok(())
            }
            None => Err(BrokerError::Cancel {
                tag: consumer_tag.to_string(),
                reason: "unknown consumer tag".to_string(),
            }),
        }
    }

    async fn heartbeat(&self) -> bool {
        self.heartbeats.fetch_add(1, Ordering::SeqCst);
        if self.is_closed() {
            return false;
        }
        let scripted = self
            .heartbeat_script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        scripted.unwrap_or_else(|| self.healthy.load(Ordering::SeqCst))
    }

    async fn publish(&self, _exchange: &str, routing_key: &str, payload: &[u8]) -> BrokerResult<()> {
        if self.reject_publish.load(Ordering::SeqCst) || self.is_closed() {
            return Err(BrokerError::Publish("channel not accepting publishes".to_string()));
        }
        self.deliver(routing_key, payload.to_vec());
        Ok(())
    }

    async fn close(&self) -> BrokerResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.state().consumers.clear();
        Ok(())
    }
}
