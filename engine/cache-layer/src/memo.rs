//! Process-local single-flight memoizing cache
//!
//! # Concurrency
//!
//! Values live in an entry map; productions in progress live in a separate
//! pending registry mapping each key to a broadcast sender. The first caller
//! to miss a key becomes the leader: it registers a sender, runs the producer
//! and publishes the outcome. Every caller that misses the same key while the
//! leader is running subscribes to that sender instead of calling its own
//! producer.
//!
//! Neither lock is held across an `.await`. The leader never holds both locks
//! at once; followers take `pending` then `entries`.
//!
//! # Expiry
//!
//! Expired entries are dropped lazily when read. A bounded cache additionally
//! evicts least-recently-used entries once it holds more than `capacity`.

use crate::clock::{Clock, SystemClock};
use crate::error::CacheError;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::debug;

type Outcome<V> = Result<V, String>;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// `remember` calls answered from a stored entry
    pub hits: u64,
    /// `remember` calls that had to wait for a production
    pub misses: u64,
    /// Misses that shared another caller's in-flight production
    pub coalesced: u64,
    /// Entries dropped to respect the capacity bound
    pub evictions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    evictions: AtomicU64,
}

struct Slot<V> {
    value: V,
    expires_at: Instant,
    last_used: u64,
}

struct Entries<K, V> {
    slots: HashMap<K, Slot<V>>,
    /// last_used tick -> key, oldest first
    recency: BTreeMap<u64, K>,
    tick: u64,
    capacity: Option<usize>,
}

impl<K: Eq + Hash + Clone, V: Clone> Entries<K, V> {
    fn new(capacity: Option<usize>) -> Self {
        Self { slots: HashMap::new(), recency: BTreeMap::new(), tick: 0, capacity }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn get(&mut self, key: &K, now: Instant) -> Option<V> {
        let expired = self.slots.get(key)?.expires_at <= now;
        if expired {
            self.remove(key);
            return None;
        }

        let tick = self.next_tick();
        let slot = self.slots.get_mut(key)?;
        self.recency.remove(&slot.last_used);
        slot.last_used = tick;
        self.recency.insert(tick, key.clone());
        Some(slot.value.clone())
    }

    /// Returns how many entries were evicted to make room.
    fn insert(&mut self, key: K, value: V, expires_at: Instant) -> u64 {
        self.remove(&key);

        let tick = self.next_tick();
        self.recency.insert(tick, key.clone());
        self.slots.insert(key, Slot { value, expires_at, last_used: tick });

        let mut evicted = 0;
        if let Some(capacity) = self.capacity {
            while self.slots.len() > capacity {
                let Some((_, oldest)) = self.recency.pop_first() else { break };
                self.slots.remove(&oldest);
                evicted += 1;
            }
        }
        evicted
    }

    fn remove(&mut self, key: &K) {
        if let Some(slot) = self.slots.remove(key) {
            self.recency.remove(&slot.last_used);
        }
    }
}

/// Removes the pending registration when the leader finishes or is dropped
/// mid-production, so waiters never hang on an abandoned key.
struct InFlight<'a, K: Eq + Hash, V> {
    pending: &'a Mutex<HashMap<K, broadcast::Sender<Outcome<V>>>>,
    key: &'a K,
}

impl<K: Eq + Hash, V> Drop for InFlight<'_, K, V> {
    fn drop(&mut self) {
        self.pending.lock().remove(self.key);
    }
}

enum Role<V> {
    Leader(broadcast::Sender<Outcome<V>>),
    Follower(broadcast::Receiver<Outcome<V>>),
}

/// TTL cache whose misses are single-flight per key.
pub struct MemoCache<K, V> {
    entries: Mutex<Entries<K, V>>,
    pending: Mutex<HashMap<K, broadcast::Sender<Outcome<V>>>>,
    clock: Arc<dyn Clock>,
    counters: Counters,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    /// Unbounded cache; expired entries are dropped lazily on read.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(None, clock)
    }

    /// LRU-bounded cache holding at most `capacity` entries.
    pub fn bounded(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self::with_capacity(Some(capacity.max(1)), clock)
    }

    fn with_capacity(capacity: Option<usize>, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(Entries::new(capacity)),
            pending: Mutex::new(HashMap::new()),
            clock,
            counters: Counters::default(),
        }
    }

    /// Stored, unexpired value for `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        self.entries.lock().get(key, now)
    }

    /// Store `value` until `ttl` from now.
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        let evicted = self.entries.lock().insert(key, value, expires_at);
        if evicted > 0 {
            self.counters.evictions.fetch_add(evicted, Ordering::Relaxed);
            debug!("Evicted {} least-recently-used cache entries", evicted);
        }
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.lock().remove(key);
    }

    /// Number of stored entries, expired ones included until they are read.
    pub fn len(&self) -> usize {
        self.entries.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }

    /// Return the cached value for `key`, producing and storing it on a miss.
    ///
    /// Concurrent callers missing the same key share one `producer` call. A
    /// failed production is not stored; callers that were waiting on it get
    /// [`CacheError::ProducerFailed`] with the leader's error message.
    pub async fn remember<F, Fut, E>(&self, key: K, ttl: Duration, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: From<CacheError> + fmt::Display,
    {
        let mut producer = Some(producer);

        loop {
            if let Some(value) = self.get(&key) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for key: {:?}", key);
                return Ok(value);
            }

            let role = {
                let mut pending = self.pending.lock();
                // The leader may have stored the value between our read and this lock.
                if let Some(value) = self.get(&key) {
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(value);
                }
                match pending.get(&key) {
                    Some(sender) => Role::Follower(sender.subscribe()),
                    None => {
                        let (sender, _) = broadcast::channel(1);
                        pending.insert(key.clone(), sender.clone());
                        Role::Leader(sender)
                    }
                }
            };

            match role {
                Role::Follower(mut receiver) => {
                    self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!("Coalescing request for key {:?} onto in-flight production", key);
                    match receiver.recv().await {
                        Ok(Ok(value)) => return Ok(value),
                        Ok(Err(message)) => {
                            return Err(E::from(CacheError::ProducerFailed {
                                key: format!("{key:?}"),
                                message,
                            }))
                        }
                        // Leader was dropped before publishing; compete again.
                        Err(_) => continue,
                    }
                }
                Role::Leader(sender) => {
                    self.counters.misses.fetch_add(1, Ordering::Relaxed);
                    debug!("Cache miss for key: {:?}", key);

                    let registration = InFlight { pending: &self.pending, key: &key };
                    let Some(produce) = producer.take() else {
                        return Err(E::from(CacheError::Internal(format!(
                            "producer for {key:?} already consumed"
                        ))));
                    };

                    let outcome = produce().await;
                    if let Ok(value) = &outcome {
                        self.insert(key.clone(), value.clone(), ttl);
                    }
                    drop(registration);

                    let shared = match &outcome {
                        Ok(value) => Ok(value.clone()),
                        Err(e) => Err(e.to_string()),
                    };
                    // No receivers is fine: nobody was waiting.
                    let _ = sender.send(shared);
                    return outcome;
                }
            }
        }
    }
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    /// Unbounded cache on the system clock.
    pub fn with_system_clock() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl<K, V> fmt::Debug for MemoCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoCache")
            .field("capacity", &self.entries.lock().capacity)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
