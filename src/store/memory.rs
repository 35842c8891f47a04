//! Process-local counters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::store::{CounterStore, StoreError, StoreResult};

/// A thread-safe in-memory counter map.
#[derive(Clone, Default, Debug)]
pub struct MemoryCounterStore {
    inner: Arc<DashMap<String, i64>>,
    fail_incr: Arc<AtomicBool>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `key`.
    pub fn get(&self, key: &str) -> Option<i64> {
        self.inner.get(key).map(|r| *r.value())
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Make increments fail, to exercise error paths.
    pub fn fail_increments(&self, fail: bool) {
        self.fail_incr.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr(&self, key: &str) -> StoreResult<i64> {
        if self.fail_incr.load(Ordering::SeqCst) {
            return Err(StoreError::Command {
                command: "INCR",
                key: key.to_string(),
                reason: "store unavailable".to_string(),
            });
        }
        let mut entry = self.inner.entry(key.to_string()).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .inner
            .iter()
            .filter(|r| r.key().starts_with(prefix))
            .map(|r| r.key().clone())
            .collect())
    }

    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<i64>>> {
        Ok(keys.iter().map(|k| self.get(k)).collect())
    }
}
