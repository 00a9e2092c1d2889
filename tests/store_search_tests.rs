//! Integration tests for the chunk store write and read paths.
//!
//! The month-boundary scenarios pin down the sub-query fan-out: a range
//! query must pick up the chunk that starts before the requested range,
//! and results must come back chronologically ordered no matter which
//! sub-query finishes first.

use bytes::Bytes;
use chunkvault::chunk::ChunkEncoder;
use chunkvault::store::{
    ChunkStore, ChunkWriteRequest, MemoryBackend, Store, StoreConfig, WideColumnBackend,
    MONTH_SECONDS,
};
use chunkvault::Error;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn sealed_chunk(t0: u32) -> Bytes {
    let mut enc = ChunkEncoder::new(t0);
    enc.push(t0, 1.5).unwrap();
    enc.push(t0 + 10, 2.5).unwrap();
    enc.seal()
}

fn store_with_backend() -> (ChunkStore, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let store = ChunkStore::new(StoreConfig::default(), backend.clone()).unwrap();
    (store, backend)
}

/// Write chunks through the store and block until all of them are
/// persisted, using the persist notification stream.
async fn write_chunks(store: &ChunkStore, key: &str, t0s: &[u32]) {
    let mut persists = store.subscribe_persist();
    for &t0 in t0s {
        store
            .add(ChunkWriteRequest::new(key, t0, 0, sealed_chunk(t0)))
            .await
            .unwrap();
    }
    for _ in t0s {
        tokio::time::timeout(Duration::from_secs(5), persists.recv())
            .await
            .expect("timed out waiting for persist")
            .expect("persist channel closed");
    }
}

#[tokio::test]
async fn preceding_chunk_is_included() {
    let (store, _backend) = store_with_backend();
    write_chunks(&store, "m1", &[0, 600, 1200, 1800]).await;

    let token = CancellationToken::new();
    let chunks = store.search(&token, "m1", 0, 900, 1500).await.unwrap();
    let ts: Vec<u32> = chunks.iter().map(|c| c.ts()).collect();
    assert_eq!(ts, vec![600, 1200]);
    store.stop();
}

#[tokio::test]
async fn two_month_span_merges_three_subqueries() {
    let (store, _backend) = store_with_backend();
    let m = MONTH_SECONDS;
    write_chunks(&store, "m2", &[m - 600, m, m + 600]).await;

    let token = CancellationToken::new();
    let chunks = store
        .search(&token, "m2", 0, m - 300, m + 1200)
        .await
        .unwrap();
    let ts: Vec<u32> = chunks.iter().map(|c| c.ts()).collect();
    assert_eq!(ts, vec![m - 600, m, m + 600]);
    store.stop();
}

#[tokio::test]
async fn multi_month_results_are_chronological() {
    let (store, _backend) = store_with_backend();
    let m = MONTH_SECONDS;
    // out-of-order writes across three months
    write_chunks(&store, "m3", &[2 * m + 100, 100, m + 100]).await;

    let token = CancellationToken::new();
    let chunks = store
        .search(&token, "m3", 0, 50, 2 * m + 200)
        .await
        .unwrap();
    let ts: Vec<u32> = chunks.iter().map(|c| c.ts()).collect();
    assert_eq!(ts, vec![100, m + 100, 2 * m + 100]);
    store.stop();
}

#[tokio::test]
async fn chunk_points_survive_the_round_trip() {
    let (store, _backend) = store_with_backend();
    write_chunks(&store, "m4", &[600]).await;

    let token = CancellationToken::new();
    let chunks = store.search(&token, "m4", 0, 600, 1200).await.unwrap();
    assert_eq!(chunks.len(), 1);
    let points: Vec<(u32, f64)> = chunks[0].iter().collect();
    assert_eq!(points, vec![(600, 1.5), (610, 2.5)]);
    // span is unknown for chunks read back from the table
    assert_eq!(chunks[0].span(), 0);
    store.stop();
}

#[tokio::test]
async fn write_retries_until_success() {
    let (store, backend) = store_with_backend();
    backend.fail_next(2);

    let cwr = ChunkWriteRequest::new("m5", 600, 0, sealed_chunk(600));
    let saved = cwr.saved.clone();
    let mut persists = store.subscribe_persist();
    store.add(cwr).await.unwrap();

    let notification = tokio::time::timeout(Duration::from_secs(10), persists.recv())
        .await
        .expect("write should eventually persist")
        .unwrap();
    assert_eq!(notification.key, "m5");
    assert_eq!(notification.t0, 600);
    assert!(saved.load(Ordering::Acquire));

    let token = CancellationToken::new();
    let chunks = store.search(&token, "m5", 0, 600, 1200).await.unwrap();
    assert_eq!(chunks.len(), 1);
    store.stop();
}

#[tokio::test]
async fn read_failure_propagates_with_no_partial_result() {
    let (store, backend) = store_with_backend();
    write_chunks(&store, "m6", &[0, 600]).await;

    backend.fail_next_selects(1);
    let token = CancellationToken::new();
    let res = store.search(&token, "m6", 0, 0, 1200).await;
    assert!(matches!(res, Err(Error::Backend(_))), "got {res:?}");
    store.stop();
}

#[tokio::test]
async fn cancellation_aborts_search() {
    let (store, _backend) = store_with_backend();
    write_chunks(&store, "m7", &[0]).await;

    let token = CancellationToken::new();
    token.cancel();
    let res = store.search(&token, "m7", 0, 0, 1200).await;
    assert!(matches!(res, Err(Error::Canceled)), "got {res:?}");
    store.stop();
}

#[tokio::test]
async fn inverted_range_is_a_bad_request() {
    let (store, _backend) = store_with_backend();
    let token = CancellationToken::new();
    let res = store.search(&token, "m8", 0, 1200, 600).await;
    assert!(matches!(res, Err(Error::BadRequest(_))), "got {res:?}");

    // an empty range is fine and finds nothing
    let chunks = store.search(&token, "m8", 0, 600, 600).await.unwrap();
    assert!(chunks.is_empty());
    store.stop();
}

#[tokio::test]
async fn corrupt_rows_are_skipped() {
    let (store, backend) = store_with_backend();
    write_chunks(&store, "m9", &[0]).await;
    // a payload with an unknown tag and one shorter than two bytes
    backend
        .insert("m9_0", 600, Bytes::from_static(&[9, 1, 2, 3]), 0)
        .await
        .unwrap();
    backend
        .insert("m9_0", 1200, Bytes::from_static(&[0]), 0)
        .await
        .unwrap();

    let token = CancellationToken::new();
    let chunks = store.search(&token, "m9", 0, 0, 1800).await.unwrap();
    let ts: Vec<u32> = chunks.iter().map(|c| c.ts()).collect();
    assert_eq!(ts, vec![0]);
    store.stop();
}

#[tokio::test]
async fn search_is_bounded_by_range() {
    let (store, _backend) = store_with_backend();
    write_chunks(&store, "m10", &[0, 600, 1200, 1800, 2400]).await;

    let token = CancellationToken::new();
    let chunks = store.search(&token, "m10", 0, 700, 1300).await.unwrap();
    let ts: Vec<u32> = chunks.iter().map(|c| c.ts()).collect();
    // the chunk at or before start, plus everything strictly inside
    assert_eq!(ts, vec![600, 1200]);
    store.stop();
}
