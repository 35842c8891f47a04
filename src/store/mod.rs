//! Counter store integration.
//!
//! # Data Flow
//! ```text
//! MessageProcessor → incr(ddc/device-measurements/<devID>)
//! ddc-counts       → keys_with_prefix + mget → device_counts()
//!
//! RedisURI
//!     redis://… | tcp://…  → redis.rs (multiplexed async connection)
//!     memory://             → memory.rs (DashMap, process-local)
//! ```

pub mod memory;
pub mod redis;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::ingest::message::{device_from_key, COUNTER_KEY_PREFIX};

pub use self::memory::MemoryCounterStore;
pub use self::redis::RedisCounterStore;

/// Errors that can occur during counter store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// URI could not be understood.
    #[error("Invalid counter store URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// Connection could not be established.
    #[error("Counter store connection failed: {0}")]
    Connect(String),

    /// A command failed.
    #[error("{command} failed for '{key}': {reason}")]
    Command {
        command: &'static str,
        key: String,
        reason: String,
    },
}

/// Result type for counter store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Atomic per-key counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key` by one, returning the new value.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// All keys starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Values for `keys`, `None` where a key vanished.
    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<i64>>>;
}

/// Where the counters live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    /// Redis server at the given `redis://` URL.
    Redis(String),
    /// Process-local map.
    Memory,
}

impl StoreTarget {
    /// Interpret a `RedisURI` value. `tcp://` is accepted as an alias of `redis://`.
    pub fn parse(uri: &str) -> StoreResult<Self> {
        let mut url = url::Url::parse(uri).map_err(|e| StoreError::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "memory" => Ok(StoreTarget::Memory),
            "redis" | "rediss" => Ok(StoreTarget::Redis(url.to_string())),
            "tcp" => {
                url.set_scheme("redis").map_err(|_| StoreError::InvalidUri {
                    uri: uri.to_string(),
                    reason: "cannot rewrite tcp scheme".to_string(),
                })?;
                Ok(StoreTarget::Redis(url.to_string()))
            }
            other => Err(StoreError::InvalidUri {
                uri: uri.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            }),
        }
    }
}

/// Open the store named by `uri`.
pub async fn connect(uri: &str) -> StoreResult<Arc<dyn CounterStore>> {
    match StoreTarget::parse(uri)? {
        StoreTarget::Memory => {
            tracing::warn!("Using in-memory counter store; counts are lost on exit");
            Ok(Arc::new(MemoryCounterStore::new()))
        }
        StoreTarget::Redis(url) => Ok(Arc::new(RedisCounterStore::connect(&url).await?)),
    }
}

/// Current count per device, read through key enumeration and multi-get.
pub async fn device_counts(store: &dyn CounterStore) -> StoreResult<BTreeMap<String, i64>> {
    let keys = store.keys_with_prefix(COUNTER_KEY_PREFIX).await?;
    if keys.is_empty() {
        return Ok(BTreeMap::new());
    }

    let values = store.mget(&keys).await?;
    Ok(keys
        .iter()
        .zip(values)
        .filter_map(|(key, value)| Some((device_from_key(key)?.to_string(), value?)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        assert_eq!(StoreTarget::parse("memory://").unwrap(), StoreTarget::Memory);
        assert_eq!(
            StoreTarget::parse("redis://127.0.0.1:6379").unwrap(),
            StoreTarget::Redis("redis://127.0.0.1:6379".into())
        );
        assert_eq!(
            StoreTarget::parse("tcp://127.0.0.1:6379").unwrap(),
            StoreTarget::Redis("redis://127.0.0.1:6379".into())
        );
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        let err = StoreTarget::parse("http://127.0.0.1:6379").unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
        assert!(StoreTarget::parse("no scheme").is_err());
    }

    #[tokio::test]
    async fn test_device_counts_strips_prefix() {
        let store = MemoryCounterStore::new();
        store.incr("ddc/device-measurements/x1").await.unwrap();
        store.incr("ddc/device-measurements/x1").await.unwrap();
        store.incr("ddc/device-measurements/x2").await.unwrap();
        store.incr("unrelated/x3").await.unwrap();

        let counts = device_counts(&store).await.unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts["x1"], 2);
        assert_eq!(counts["x2"], 1);
    }

    #[tokio::test]
    async fn test_device_counts_empty_store() {
        let store = MemoryCounterStore::new();
        assert!(device_counts(&store).await.unwrap().is_empty());
    }
}
