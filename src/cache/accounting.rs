//! Global cache accounting and eviction.
//!
//! The accountant owns the only authoritative view of how many bytes the
//! chunk cache holds across all metrics. Cache operations report admissions
//! and hits as events on a channel; the accountant thread folds them into
//! an LRU ordering and, whenever the total exceeds the configured cap,
//! emits eviction targets that the cache's evict loop applies.

use crossbeam_channel::{Receiver, Sender};
use std::collections::{BTreeMap, HashMap};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Chunk identity as tracked by the accountant.
type ChunkKey = (String, u32);

#[derive(Debug)]
pub(crate) enum CacheEvent {
    Add { metric: String, ts: u32, size: usize },
    Hit { metric: String, ts: u32 },
    Stop,
}

/// An eviction decision: the owning metric must drop the chunk at `ts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictTarget {
    pub metric: String,
    pub ts: u32,
}

/// Least-recently-used ordering over chunk keys.
///
/// Backed by a monotonic sequence number per touch: `by_seq` yields the
/// stalest key in O(log n), `by_key` locates a key's current slot.
#[derive(Debug, Default)]
struct Lru {
    seq: u64,
    by_key: HashMap<ChunkKey, u64>,
    by_seq: BTreeMap<u64, ChunkKey>,
}

impl Lru {
    fn touch(&mut self, key: ChunkKey) {
        if let Some(old) = self.by_key.get(&key) {
            self.by_seq.remove(old);
        }
        self.seq += 1;
        self.by_key.insert(key.clone(), self.seq);
        self.by_seq.insert(self.seq, key);
    }

    fn pop_oldest(&mut self) -> Option<ChunkKey> {
        let (&seq, _) = self.by_seq.iter().next()?;
        let key = self.by_seq.remove(&seq)?;
        self.by_key.remove(&key);
        Some(key)
    }

    fn contains(&self, key: &ChunkKey) -> bool {
        self.by_key.contains_key(key)
    }

    fn len(&self) -> usize {
        self.by_key.len()
    }
}

struct AccountantState {
    max_size: u64,
    total: u64,
    sizes: HashMap<ChunkKey, usize>,
    lru: Lru,
    evict_tx: Sender<EvictTarget>,
}

impl AccountantState {
    fn on_add(&mut self, metric: String, ts: u32, size: usize) {
        let key = (metric, ts);
        if self.sizes.contains_key(&key) {
            // re-admission of a tracked chunk refreshes recency only
            self.lru.touch(key);
            return;
        }
        self.total += size as u64;
        self.sizes.insert(key.clone(), size);
        self.lru.touch(key);
        self.evict_while_over_cap();
    }

    fn on_hit(&mut self, metric: String, ts: u32) {
        let key = (metric, ts);
        if self.lru.contains(&key) {
            self.lru.touch(key);
        }
    }

    fn evict_while_over_cap(&mut self) {
        while self.total > self.max_size {
            let Some(key) = self.lru.pop_oldest() else {
                warn!(total = self.total, "accountant over cap with empty lru");
                return;
            };
            let size = self.sizes.remove(&key).unwrap_or(0);
            self.total -= size as u64;
            debug!(metric = %key.0, ts = key.1, size, "evicting chunk");
            let target = EvictTarget {
                metric: key.0,
                ts: key.1,
            };
            if self.evict_tx.send(target).is_err() {
                // evict loop is gone, accounting continues for stats only
                return;
            }
        }
    }
}

/// Handle to the accountant thread.
///
/// All methods are non-blocking from the caller's perspective: events go
/// over an unbounded channel and are folded in asynchronously.
#[derive(Debug)]
pub struct FlatAccountant {
    events: Sender<CacheEvent>,
}

impl FlatAccountant {
    /// Spawn the accountant. Returns the handle, the eviction target
    /// stream, and the thread's join handle.
    pub(crate) fn spawn(
        max_size: u64,
    ) -> (FlatAccountant, Receiver<EvictTarget>, JoinHandle<()>) {
        let (event_tx, event_rx) = crossbeam_channel::unbounded::<CacheEvent>();
        let (evict_tx, evict_rx) = crossbeam_channel::unbounded::<EvictTarget>();

        let handle = std::thread::Builder::new()
            .name("cache-accountant".to_string())
            .spawn(move || {
                let mut state = AccountantState {
                    max_size,
                    total: 0,
                    sizes: HashMap::new(),
                    lru: Lru::default(),
                    evict_tx,
                };
                while let Ok(event) = event_rx.recv() {
                    match event {
                        CacheEvent::Add { metric, ts, size } => state.on_add(metric, ts, size),
                        CacheEvent::Hit { metric, ts } => state.on_hit(metric, ts),
                        CacheEvent::Stop => break,
                    }
                    super::telemetry::record_cache_size(state.total, state.lru.len() as u64);
                }
            })
            .expect("failed to spawn cache accountant thread");

        (FlatAccountant { events: event_tx }, evict_rx, handle)
    }

    pub fn add(&self, metric: &str, ts: u32, size: usize) {
        let _ = self.events.send(CacheEvent::Add {
            metric: metric.to_string(),
            ts,
            size,
        });
    }

    pub fn hit(&self, metric: &str, ts: u32) {
        let _ = self.events.send(CacheEvent::Hit {
            metric: metric.to_string(),
            ts,
        });
    }

    pub fn stop(&self) {
        let _ = self.events.send(CacheEvent::Stop);
    }
}
