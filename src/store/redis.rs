//! Redis-backed counters.

use async_trait::async_trait;
use ::redis::aio::MultiplexedConnection;
use ::redis::AsyncCommands;

use crate::store::{CounterStore, StoreError, StoreResult};

/// Counter store on a Redis server.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: MultiplexedConnection,
    url: String,
}

impl RedisCounterStore {
    /// Connect to `url` (`redis://host:port[/db]`).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = ::redis::Client::open(url).map_err(|e| StoreError::Connect(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        tracing::info!(url = %url, "Connected to counter store");
        Ok(Self {
            conn,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1i64).await.map_err(|e| StoreError::Command {
            command: "INCR",
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    async fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", prefix);
        conn.keys(&pattern).await.map_err(|e| StoreError::Command {
            command: "KEYS",
            key: pattern.clone(),
            reason: e.to_string(),
        })
    }

    async fn mget(&self, keys: &[String]) -> StoreResult<Vec<Option<i64>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        // Explicit MGET: the typed helper sends GET for a single key, which
        // does not come back as a list.
        ::redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Command {
                command: "MGET",
                key: keys.join(" "),
                reason: e.to_string(),
            })
    }
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("url", &self.url)
            .finish()
    }
}
