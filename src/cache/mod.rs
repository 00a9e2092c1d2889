//! Tiered chunk cache.
//!
//! One [`MetricCache`] per metric holds that metric's sealed chunks in a
//! linked map; the [`ChunkCache`] owns the per-metric entries and reports
//! every admission and hit to the global accountant, which enforces the
//! byte cap by handing eviction targets back to the cache's evict loop.

mod accounting;
mod metric;
pub(crate) mod telemetry;

pub use accounting::{EvictTarget, FlatAccountant};
pub use metric::{CCSearchResult, MetricCache};

use crate::chunk::IterGen;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::info;

/// Chunk cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Soft cap on accounted payload bytes across all metrics
    pub max_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 512 * 1024 * 1024,
        }
    }
}

/// Global cache over all metrics.
pub struct ChunkCache {
    metrics: Arc<DashMap<String, Arc<MetricCache>>>,
    accnt: FlatAccountant,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ChunkCache {
    pub fn new(config: CacheConfig) -> Self {
        let (accnt, evict_rx, accnt_handle) = FlatAccountant::spawn(config.max_size);
        let metrics: Arc<DashMap<String, Arc<MetricCache>>> = Arc::new(DashMap::new());

        let evict_metrics = Arc::clone(&metrics);
        let evict_handle = std::thread::Builder::new()
            .name("cache-evict".to_string())
            .spawn(move || {
                for target in evict_rx.iter() {
                    let remaining = match evict_metrics.get(&target.metric) {
                        Some(mc) => mc.del(target.ts),
                        None => continue,
                    };
                    if remaining == 0 {
                        evict_metrics.remove_if(&target.metric, |_, mc| mc.is_empty());
                    }
                    telemetry::record_eviction();
                }
            })
            .expect("failed to spawn cache evict thread");

        Self {
            metrics,
            accnt,
            threads: Mutex::new(vec![accnt_handle, evict_handle]),
        }
    }

    /// Admit a chunk. `prev` is the start timestamp of the chronologically
    /// previous chunk, or 0 when unknown.
    pub fn add(&self, metric: &str, prev: u32, itergen: IterGen) {
        let ts = itergen.ts();
        let size = itergen.size();
        match self.metrics.entry(metric.to_string()) {
            Entry::Occupied(e) => e.get().add(prev, itergen),
            Entry::Vacant(e) => {
                let mc = Arc::new(MetricCache::new());
                mc.init(prev, itergen);
                e.insert(mc);
            }
        }
        self.accnt.add(metric, ts, size);
        telemetry::record_add();
    }

    /// Admit a chunk only when the metric is already cached, so that reads
    /// of cold metrics do not populate the cache. Returns whether the
    /// chunk was admitted.
    pub fn add_if_hot(&self, metric: &str, prev: u32, itergen: IterGen) -> bool {
        let ts = itergen.ts();
        let size = itergen.size();
        let Some(mc) = self.metrics.get(metric) else {
            return false;
        };
        mc.add(prev, itergen);
        drop(mc);
        self.accnt.add(metric, ts, size);
        telemetry::record_add();
        true
    }

    /// Range search for `[from, until)`. Reported hits refresh the LRU
    /// recency of every returned chunk.
    pub fn search(&self, metric: &str, from: u32, until: u32) -> CCSearchResult {
        if from >= until {
            return CCSearchResult::new(from, until);
        }
        let Some(mc) = self.metrics.get(metric) else {
            telemetry::record_search_outcome("miss");
            return CCSearchResult::new(from, until);
        };
        let res = mc.search(from, until);
        drop(mc);

        for ig in res.start.iter().chain(res.end.iter()) {
            self.accnt.hit(metric, ig.ts());
        }
        let outcome = if res.complete {
            "hit"
        } else if res.is_empty() {
            "miss"
        } else {
            "partial"
        };
        telemetry::record_search_outcome(outcome);
        res
    }

    /// Number of metrics currently cached.
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Stop the accountant and evict loops, waiting for both to drain.
    pub fn stop(&self) {
        self.accnt.stop();
        let handles = std::mem::take(&mut *self.threads.lock());
        for handle in handles {
            if handle.join().is_err() {
                info!("cache worker thread panicked during shutdown");
            }
        }
    }
}
