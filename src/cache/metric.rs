//! Per-metric cache of sealed chunks.
//!
//! Chunks are held in a map keyed by their start timestamp. Neighboring
//! chunks are additionally stitched into a doubly-linked list through
//! `prev`/`next` fields that store the neighbor's key (0 means no
//! neighbor), so a range search can walk consecutive runs without
//! consulting the sorted key list again.

use crate::chunk::IterGen;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, warn};

/// One cached chunk and its neighbor links.
#[derive(Debug, Clone)]
struct CacheChunk {
    ts: u32,
    prev: u32,
    next: u32,
    itergen: IterGen,
}

/// Result of a cache range search.
///
/// `start` holds the run of chunks covering `from` in ascending order;
/// `end` holds the run covering `until` in the backward walk order it was
/// collected in (descending). When `complete` is false, `[from, until)` is
/// the remaining gap the caller has to fetch from the persistent store.
#[derive(Debug, Clone)]
pub struct CCSearchResult {
    pub from: u32,
    pub until: u32,
    pub complete: bool,
    pub start: Vec<IterGen>,
    pub end: Vec<IterGen>,
}

impl CCSearchResult {
    pub fn new(from: u32, until: u32) -> Self {
        Self {
            from,
            until,
            complete: false,
            start: Vec::new(),
            end: Vec::new(),
        }
    }

    /// All found chunks in ascending order.
    pub fn merged(self) -> Vec<IterGen> {
        let mut out = self.start;
        out.extend(self.end.into_iter().rev());
        out
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_empty() && self.end.is_empty()
    }
}

#[derive(Debug, Default)]
struct MetricCacheInner {
    /// Start timestamp of the newest cached chunk.
    newest: u32,
    /// Start timestamp of the oldest cached chunk.
    oldest: u32,
    chunks: HashMap<u32, CacheChunk>,
}

/// Cache of chunks for a single metric, protected by a shared-exclusive
/// lock: searches take read, add/del take write.
#[derive(Debug, Default)]
pub struct MetricCache {
    inner: RwLock<MetricCacheInner>,
}

impl MetricCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit the first chunk and prime the oldest/newest extremes.
    pub fn init(&self, prev: u32, itergen: IterGen) {
        let ts = itergen.ts();
        self.add(prev, itergen);
        let mut inner = self.inner.write();
        inner.oldest = ts;
        inner.newest = ts;
    }

    /// Idempotent insert. Splices the chunk into the linked structure when
    /// the previous chunk (as named by the caller) or the immediately
    /// following chunk is already cached.
    pub fn add(&self, prev: u32, itergen: IterGen) {
        let ts = itergen.ts();
        let mut inner = self.inner.write();
        if inner.chunks.contains_key(&ts) {
            // already present, nothing to reconcile
            return;
        }

        inner.chunks.insert(
            ts,
            CacheChunk {
                ts,
                prev: 0,
                next: 0,
                itergen,
            },
        );

        let end_ts = inner.end_ts(ts);
        debug!(ts, end_ts, "caching chunk");

        if prev != 0 && inner.chunks.contains_key(&prev) {
            inner.chunks.get_mut(&prev).expect("present").next = ts;
            inner.chunks.get_mut(&ts).expect("present").prev = prev;
        }

        // end_ts falls back to ts when it cannot be inferred
        if end_ts > ts && inner.chunks.contains_key(&end_ts) {
            inner.chunks.get_mut(&end_ts).expect("present").prev = ts;
            inner.chunks.get_mut(&ts).expect("present").next = end_ts;
        }

        if ts > inner.newest {
            inner.newest = ts;
        } else if ts < inner.oldest {
            inner.oldest = ts;
        }
    }

    /// Remove the chunk starting at `ts`, zeroing any neighbor pointers
    /// aimed at it. Returns the number of chunks left for this metric.
    pub fn del(&self, ts: u32) -> usize {
        let mut inner = self.inner.write();
        let Some(chunk) = inner.chunks.get(&ts) else {
            return inner.chunks.len();
        };
        let (prev, next) = (chunk.prev, chunk.next);

        if prev != 0 {
            if let Some(p) = inner.chunks.get_mut(&prev) {
                p.next = 0;
            }
        }
        if next != 0 {
            if let Some(n) = inner.chunks.get_mut(&next) {
                n.prev = 0;
            }
        }
        inner.chunks.remove(&ts);

        // keep the extremes honest when one of them was removed
        if !inner.chunks.is_empty() {
            if ts == inner.oldest {
                inner.oldest = *inner.chunks.keys().min().expect("non-empty");
            }
            if ts == inner.newest {
                inner.newest = *inner.chunks.keys().max().expect("non-empty");
            }
        }
        inner.chunks.len()
    }

    pub fn len(&self) -> usize {
        self.inner.read().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().chunks.is_empty()
    }

    pub fn oldest(&self) -> u32 {
        self.inner.read().oldest
    }

    pub fn newest(&self) -> u32 {
        self.inner.read().newest
    }

    /// Two-phase range search under one read-lock acquisition.
    ///
    /// First seek the chunk containing `from` and walk forward through
    /// `next` pointers; if that run does not reach `until`, seek the chunk
    /// containing `until-1` and walk backward through `prev` pointers. Any
    /// gap between the two runs is left for the persistent store.
    pub fn search(&self, from: u32, until: u32) -> CCSearchResult {
        let mut res = CCSearchResult::new(from, until);
        let inner = self.inner.read();
        if inner.chunks.is_empty() {
            return res;
        }

        let keys = inner.sorted_ts();

        inner.search_forward(from, until - 1, &keys, &mut res);
        if !res.complete {
            inner.search_backward(from, until - 1, &keys, &mut res);
        }

        if !res.complete && res.from > res.until {
            warn!(
                res_from = res.from,
                res_until = res.until,
                oldest = inner.oldest,
                newest = inner.newest,
                "cache search produced from > until, pointer graph is suspect"
            );
        }

        res
    }
}

impl MetricCacheInner {
    /// Sorted slice of all chunk start timestamps.
    fn sorted_ts(&self) -> Vec<u32> {
        let mut keys: Vec<u32> = self.chunks.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// End timestamp of the chunk at `ts`, inferred when the span is
    /// unknown: next chunk's start, else the gap to the previous chunk,
    /// else `ts` itself (treated as empty).
    fn end_ts(&self, ts: u32) -> u32 {
        let chunk = &self.chunks[&ts];
        let span = chunk.itergen.span();
        if span > 0 {
            return chunk.ts + span;
        }
        if chunk.next != 0 {
            return chunk.next;
        }
        if chunk.prev != 0 {
            return chunk.ts + (chunk.ts - chunk.prev);
        }
        chunk.ts
    }

    /// First key `k` with `k <= ts < end_ts(k)`, scanning ascending.
    fn seek_asc(&self, ts: u32, keys: &[u32]) -> Option<u32> {
        keys.iter()
            .take_while(|&&k| k <= ts)
            .find(|&&k| self.end_ts(k) > ts)
            .copied()
    }

    /// Last key `k` with `k <= ts < end_ts(k)`, scanning descending.
    fn seek_desc(&self, ts: u32, keys: &[u32]) -> Option<u32> {
        for &k in keys.iter().rev() {
            if self.end_ts(k) <= ts {
                break;
            }
            if k <= ts {
                return Some(k);
            }
        }
        None
    }

    fn search_forward(&self, from: u32, until: u32, keys: &[u32], res: &mut CCSearchResult) {
        let Some(mut ts) = self.seek_asc(from, keys) else {
            return;
        };

        // add consecutive chunks starting at the one containing `from`
        loop {
            let chunk = &self.chunks[&ts];
            res.start.push(chunk.itergen.clone());
            let end_ts = self.end_ts(ts);
            res.from = end_ts;

            if end_ts >= until {
                res.complete = true;
                return;
            }
            if chunk.next == 0 {
                return;
            }
            ts = chunk.next;
        }
    }

    fn search_backward(&self, from: u32, until: u32, keys: &[u32], res: &mut CCSearchResult) {
        let Some(mut ts) = self.seek_desc(until, keys) else {
            return;
        };

        loop {
            let chunk = &self.chunks[&ts];
            res.end.push(chunk.itergen.clone());
            res.until = chunk.ts;

            if chunk.ts <= from || chunk.prev == 0 {
                return;
            }
            ts = chunk.prev;
        }
    }
}
