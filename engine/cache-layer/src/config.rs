//! Cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the durable (Redis) tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis connection URL; `None` keeps the durable tier in process memory
    pub redis_url: Option<String>,

    /// Prefix applied to every durable key
    pub key_prefix: String,

    /// TTL applied to refreshed entries, in seconds
    pub durable_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: "fantasy".to_string(),
            durable_ttl_secs: 7 * 24 * 3600, // 1 week
        }
    }
}

impl CacheConfig {
    pub fn durable_ttl(&self) -> Duration {
        Duration::from_secs(self.durable_ttl_secs)
    }
}
