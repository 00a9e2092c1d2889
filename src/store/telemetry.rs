//! Chunk store telemetry instruments and recording helpers.

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

struct StoreInstruments {
    chunk_saves: Counter<u64>,
    corrupt_chunks: Counter<u64>,
    write_queue_depth: Histogram<u64>,
    write_queue_wait_seconds: Histogram<f64>,
    read_queue_depth: Histogram<u64>,
    search_duration_seconds: Histogram<f64>,
    search_queries: Histogram<u64>,
    search_chunks: Histogram<u64>,
    chunks_per_row: Histogram<u64>,
}

fn instruments() -> &'static StoreInstruments {
    static INSTRUMENTS: OnceLock<StoreInstruments> = OnceLock::new();
    INSTRUMENTS.get_or_init(|| {
        let meter = global::meter("chunkvault.store");
        StoreInstruments {
            chunk_saves: meter
                .u64_counter("chunkvault.store.chunk.saves")
                .with_description("Chunk save attempts by outcome")
                .init(),
            corrupt_chunks: meter
                .u64_counter("chunkvault.store.chunk.corrupt")
                .with_description("Persisted chunks skipped as unreadable")
                .init(),
            write_queue_depth: meter
                .u64_histogram("chunkvault.store.write_queue.depth")
                .with_description("Write queue depth sampled on enqueue and per tick")
                .init(),
            write_queue_wait_seconds: meter
                .f64_histogram("chunkvault.store.write_queue.wait")
                .with_description("Time a chunk waited in the write queue before the save attempt")
                .with_unit("s")
                .init(),
            read_queue_depth: meter
                .u64_histogram("chunkvault.store.read_queue.depth")
                .with_description("Read queue depth sampled on dispatch and per tick")
                .init(),
            search_duration_seconds: meter
                .f64_histogram("chunkvault.store.search.duration")
                .with_description("End to end store search duration")
                .with_unit("s")
                .init(),
            search_queries: meter
                .u64_histogram("chunkvault.store.search.queries")
                .with_description("Sub-queries issued per search")
                .init(),
            search_chunks: meter
                .u64_histogram("chunkvault.store.search.chunks")
                .with_description("Chunks returned per search")
                .init(),
            chunks_per_row: meter
                .u64_histogram("chunkvault.store.search.chunks_per_row")
                .with_description("Chunks read per row sub-query")
                .init(),
        }
    })
}

pub(crate) fn record_chunk_save(outcome: &'static str) {
    instruments()
        .chunk_saves
        .add(1, &[KeyValue::new("outcome", outcome)]);
}

pub(crate) fn record_corrupt_chunk() {
    instruments().corrupt_chunks.add(1, &[]);
}

pub(crate) fn record_write_queue_depth(shard: usize, depth: u64) {
    instruments()
        .write_queue_depth
        .record(depth, &[KeyValue::new("shard", shard as i64)]);
}

pub(crate) fn record_write_queue_wait(seconds: f64) {
    instruments().write_queue_wait_seconds.record(seconds, &[]);
}

pub(crate) fn record_read_queue_depth(depth: u64) {
    instruments().read_queue_depth.record(depth, &[]);
}

pub(crate) fn record_search(queries: usize, chunks: usize, duration_seconds: f64) {
    let i = instruments();
    i.search_queries.record(queries as u64, &[]);
    i.search_chunks.record(chunks as u64, &[]);
    i.search_duration_seconds.record(duration_seconds, &[]);
}

pub(crate) fn record_chunks_per_row(chunks: usize) {
    instruments().chunks_per_row.record(chunks as u64, &[]);
}
