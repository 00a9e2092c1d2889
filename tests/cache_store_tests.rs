//! Cache and store working together: the cache serves what it has, the
//! store fills the reported gap.

use bytes::Bytes;
use chunkvault::cache::{CacheConfig, ChunkCache};
use chunkvault::chunk::{ChunkEncoder, IterGen};
use chunkvault::store::{ChunkStore, ChunkWriteRequest, MemoryBackend, Store, StoreConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn itergen(t0: u32, span: u32) -> IterGen {
    let mut enc = ChunkEncoder::new(t0);
    enc.push(t0, f64::from(t0)).unwrap();
    enc.push(t0 + 10, f64::from(t0) + 0.5).unwrap();
    IterGen::new(t0, span, enc.seal())
}

fn stream(t0: u32) -> Bytes {
    itergen(t0, 600).bytes()
}

#[tokio::test]
async fn cache_partial_hit_reports_the_gap() {
    let cache = ChunkCache::new(CacheConfig::default());
    cache.add("m", 0, itergen(0, 600));
    cache.add("m", 0, itergen(600, 600));

    let res = cache.search("m", 0, 1800);
    assert!(!res.complete);
    assert_eq!(res.from, 1200);
    assert_eq!(res.until, 1800);
    let ts: Vec<u32> = res.start.iter().map(|ig| ig.ts()).collect();
    assert_eq!(ts, vec![0, 600]);
    cache.stop();
}

#[tokio::test]
async fn store_fills_the_cache_gap() {
    let cache = ChunkCache::new(CacheConfig::default());
    let backend = Arc::new(MemoryBackend::new());
    let store = ChunkStore::new(StoreConfig::default(), backend).unwrap();

    // the store has the full history, the cache only the head
    let mut persists = store.subscribe_persist();
    for t0 in [0u32, 600, 1200] {
        store
            .add(ChunkWriteRequest::new("m", t0, 0, stream(t0)))
            .await
            .unwrap();
    }
    for _ in 0..3 {
        tokio::time::timeout(Duration::from_secs(5), persists.recv())
            .await
            .expect("timed out waiting for persist")
            .unwrap();
    }
    cache.add("m", 0, itergen(0, 600));
    cache.add("m", 0, itergen(600, 600));

    // query path: cache first, then the store for [from, until)
    let res = cache.search("m", 0, 1800);
    assert!(!res.complete);
    let token = CancellationToken::new();
    let fetched = store
        .search(&token, "m", 0, res.from, res.until)
        .await
        .unwrap();

    let mut merged: Vec<IterGen> = res.start.clone();
    merged.extend(fetched);
    merged.extend(res.end.iter().rev().cloned());

    let ts: Vec<u32> = merged.iter().map(|ig| ig.ts()).collect();
    assert_eq!(ts, vec![0, 600, 1200]);

    // every point of the range is reachable through the merged handles
    let points: Vec<(u32, f64)> = merged.iter().flat_map(|ig| ig.iter()).collect();
    assert_eq!(points.len(), 6);
    assert!(points.windows(2).all(|w| w[0].0 < w[1].0));

    store.stop();
    cache.stop();
}

#[tokio::test]
async fn cached_tail_shrinks_the_store_fetch() {
    let cache = ChunkCache::new(CacheConfig::default());
    // head and tail cached, hole in the middle
    cache.add("m", 0, itergen(0, 600));
    cache.add("m", 0, itergen(1800, 600));
    cache.add("m", 1800, itergen(2400, 600));

    let res = cache.search("m", 0, 3000);
    assert!(!res.complete);
    assert_eq!(res.from, 600);
    assert_eq!(res.until, 1800);
    let start: Vec<u32> = res.start.iter().map(|ig| ig.ts()).collect();
    let end: Vec<u32> = res.end.iter().map(|ig| ig.ts()).collect();
    assert_eq!(start, vec![0]);
    assert_eq!(end, vec![2400, 1800]);
    cache.stop();
}
