//! Chunk cache telemetry instruments and recording helpers.

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

struct CacheInstruments {
    search_outcomes: Counter<u64>,
    chunk_adds: Counter<u64>,
    chunk_evictions: Counter<u64>,
    size_bytes: Histogram<u64>,
    tracked_chunks: Histogram<u64>,
}

fn instruments() -> &'static CacheInstruments {
    static INSTRUMENTS: OnceLock<CacheInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = global::meter("chunkvault.cache");
        CacheInstruments {
            search_outcomes: meter
                .u64_counter("chunkvault.cache.search.outcomes")
                .with_description("Cache range searches by outcome")
                .init(),
            chunk_adds: meter
                .u64_counter("chunkvault.cache.chunk.adds")
                .with_description("Chunks admitted to the cache")
                .init(),
            chunk_evictions: meter
                .u64_counter("chunkvault.cache.chunk.evictions")
                .with_description("Chunks evicted by the accountant")
                .init(),
            size_bytes: meter
                .u64_histogram("chunkvault.cache.size")
                .with_description("Accounted cache size sampled per accounting event")
                .with_unit("By")
                .init(),
            tracked_chunks: meter
                .u64_histogram("chunkvault.cache.tracked_chunks")
                .with_description("Chunks tracked by the accountant")
                .init(),
        }
    })
}

pub(crate) fn record_search_outcome(outcome: &'static str) {
    instruments()
        .search_outcomes
        .add(1, &[KeyValue::new("outcome", outcome)]);
}

pub(crate) fn record_add() {
    instruments().chunk_adds.add(1, &[]);
}

pub(crate) fn record_eviction() {
    instruments().chunk_evictions.add(1, &[]);
}

pub(crate) fn record_cache_size(total_bytes: u64, chunks: u64) {
    let i = instruments();
    i.size_bytes.record(total_bytes, &[]);
    i.tracked_chunks.record(chunks, &[]);
}
