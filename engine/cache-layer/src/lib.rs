//! Cache Layer - bounds call volume to rate-limited upstream providers
//!
//! Two tiers with different contracts:
//! - [`MemoCache`]: process-local, TTL-based, single-flight memoization.
//!   Concurrent misses on one key collapse into a single producer call.
//!   [`MemoCache::bounded`] adds an LRU entry bound.
//! - [`DurableStore`]: cross-process key-value store with store-managed
//!   expiry ([`RedisStore`] in production, [`MemoryStore`] for tests and
//!   local runs). Request-serving code only ever gets a [`DurableReader`];
//!   the refresh job gets the [`DurableWriter`].

pub mod clock;
pub mod config;
pub mod durable;
pub mod error;
pub mod memo;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use durable::{DurableReader, DurableStore, DurableWriter, MemoryStore, RedisStore};
pub use error::{CacheError, CacheResult};
pub use memo::{CacheStats, MemoCache};
