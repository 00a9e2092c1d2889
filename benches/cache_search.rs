//! Chunk cache search benchmark

use chunkvault::cache::{CacheConfig, ChunkCache};
use chunkvault::chunk::{ChunkEncoder, IterGen};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

const SPAN: u32 = 600;

fn itergen(t0: u32) -> IterGen {
    let mut enc = ChunkEncoder::new(t0);
    for i in 0..60 {
        enc.push(t0 + i * 10, f64::from(i) * 0.1).unwrap();
    }
    IterGen::new(t0, SPAN, enc.seal())
}

fn build_cache(chunks: u32) -> ChunkCache {
    let cache = ChunkCache::new(CacheConfig::default());
    for i in 0..chunks {
        let t0 = i * SPAN;
        let prev = if i == 0 { 0 } else { (i - 1) * SPAN };
        cache.add("bench.metric", prev, itergen(t0));
    }
    cache
}

fn bench_search(c: &mut Criterion) {
    let cache = build_cache(1_000);
    let newest = 999 * SPAN;

    c.bench_function("search_full_hit", |b| {
        b.iter(|| {
            cache.search(
                black_box("bench.metric"),
                newest - 10 * SPAN,
                newest + SPAN,
            )
        })
    });

    c.bench_function("search_miss", |b| {
        b.iter(|| cache.search(black_box("absent.metric"), 0, 6 * SPAN))
    });

    c.bench_function("encode_chunk", |b| b.iter(|| itergen(black_box(0))));

    c.bench_function("decode_chunk", |b| {
        let ig = itergen(0);
        b.iter(|| ig.iter().count())
    });
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
