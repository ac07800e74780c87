//! Durable cache tier
//!
//! Values survive process restarts and are shared by every process instance.
//! Expiry is left to the store itself; nothing here sweeps old keys.

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::CacheResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Key-value store with store-managed TTL.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>>;

    async fn put(&self, key: &str, value: &Value, ttl_secs: u64) -> CacheResult<()>;
}

/// Redis-backed durable store
pub struct RedisStore {
    connection_manager: ConnectionManager,
    key_prefix: String,
}

impl RedisStore {
    /// Connect to the Redis instance named in `config`.
    pub async fn connect(redis_url: &str, config: &CacheConfig) -> CacheResult<Self> {
        let client = Client::open(redis_url)?;
        let connection_manager = ConnectionManager::new(client).await?;

        Ok(Self { connection_manager, key_prefix: config.key_prefix.clone() })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }
}

#[async_trait]
impl DurableStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let mut conn = self.connection_manager.clone();
        let result: Option<String> = conn.get(self.full_key(key)).await?;

        match result {
            Some(data) => {
                let value = serde_json::from_str(&data)?;
                debug!("Durable cache hit for key: {}", key);
                Ok(Some(value))
            }
            None => {
                debug!("Durable cache miss for key: {}", key);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &str, value: &Value, ttl_secs: u64) -> CacheResult<()> {
        let mut conn = self.connection_manager.clone();
        let serialized = serde_json::to_string(value)?;

        conn.set_ex::<_, _, ()>(self.full_key(key), serialized, ttl_secs).await?;
        debug!("Stored durable key: {} with TTL: {}s", key, ttl_secs);
        Ok(())
    }
}

/// In-process durable store for tests and single-process deployments.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (Value, Instant)>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), clock }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let now = self.clock.now();
        let entries = self.entries.lock();
        Ok(entries.get(key).filter(|(_, expires_at)| *expires_at > now).map(|(v, _)| v.clone()))
    }

    async fn put(&self, key: &str, value: &Value, ttl_secs: u64) -> CacheResult<()> {
        let expires_at = self.clock.now() + Duration::from_secs(ttl_secs);
        self.entries.lock().insert(key.to_string(), (value.clone(), expires_at));
        Ok(())
    }
}

/// Read-only view of the durable tier handed to request-serving code.
#[derive(Clone)]
pub struct DurableReader {
    store: Arc<dyn DurableStore>,
}

impl DurableReader {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    pub async fn get<T>(&self, key: &str) -> CacheResult<Option<T>>
    where
        T: for<'de> serde::Deserialize<'de>,
    {
        match self.store.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

/// Write access to the durable tier, owned by the refresh job.
#[derive(Clone)]
pub struct DurableWriter {
    store: Arc<dyn DurableStore>,
}

impl DurableWriter {
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    pub async fn put<T>(&self, key: &str, value: &T, ttl: Duration) -> CacheResult<()>
    where
        T: serde::Serialize,
    {
        let value = serde_json::to_value(value)?;
        self.store.put(key, &value, ttl.as_secs()).await
    }
}
