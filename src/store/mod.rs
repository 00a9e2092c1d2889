//! Persistent chunk store.
//!
//! Chunks are persisted as columns of month-sharded wide rows. Writes go
//! through per-shard queues drained by workers that retry forever; reads
//! fan out as row sub-queries over a bounded queue and merge back into one
//! chronologically ascending chunk sequence.

mod backend;
mod chunk_store;
pub(crate) mod telemetry;

pub use backend::{MemoryBackend, Row, RowSelect, WideColumnBackend, KEYSPACE_SCHEMA, TABLE_SCHEMA};
pub use chunk_store::ChunkStore;

use crate::chunk::IterGen;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Row partition granularity: 28 days in seconds. Every configured chunk
/// span must divide this so the chunk preceding any timestamp lives in the
/// same row as the timestamp itself.
pub const MONTH_SECONDS: u32 = 60 * 60 * 24 * 28;

/// Row key for the month containing `t0`.
pub fn row_key(key: &str, t0: u32) -> String {
    format!("{key}_{}", t0 / MONTH_SECONDS)
}

/// A sealed chunk on its way to the backing table.
#[derive(Debug, Clone)]
pub struct ChunkWriteRequest {
    pub key: String,
    pub t0: u32,
    /// Column TTL in seconds, from the metric's retention tier.
    pub ttl: u32,
    /// Compressed stream without the format tag; the writer prepends it.
    pub payload: Bytes,
    /// Flipped to true once the chunk is durably stored.
    pub saved: Arc<AtomicBool>,
    pub(crate) enqueued: Instant,
}

impl ChunkWriteRequest {
    pub fn new(key: impl Into<String>, t0: u32, ttl: u32, payload: Bytes) -> Self {
        Self {
            key: key.into(),
            t0,
            ttl,
            payload,
            saved: Arc::new(AtomicBool::new(false)),
            enqueued: Instant::now(),
        }
    }
}

/// Published after a chunk write succeeds, so peers and the aggregation
/// layer can observe persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistNotification {
    pub key: String,
    pub t0: u32,
}

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Number of independent write shards
    pub write_workers: usize,
    /// Capacity of each write shard queue
    pub write_queue_size: usize,
    /// Number of read workers
    pub read_workers: usize,
    /// Capacity of the shared read queue
    pub read_queue_size: usize,
    /// Per-request backend timeout (reads and individual insert attempts)
    pub backend_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            write_workers: 8,
            write_queue_size: 100_000,
            read_workers: 16,
            read_queue_size: 200,
            backend_timeout: Duration::from_secs(1),
        }
    }
}

/// The chunk persistence interface the rest of the system depends on.
#[async_trait]
pub trait Store: Send + Sync {
    /// Enqueue a chunk for persistence. Blocks while the owning write
    /// shard's queue is full; never reports the write's outcome (failed
    /// writes are retried until they succeed).
    async fn add(&self, cwr: ChunkWriteRequest) -> Result<()>;

    /// Fetch all chunks overlapping `[start, end)`, ascending by start
    /// timestamp. `ttl` is reserved for TTL-partitioned table layouts.
    async fn search(
        &self,
        token: &CancellationToken,
        key: &str,
        ttl: u32,
        start: u32,
        end: u32,
    ) -> Result<Vec<IterGen>>;

    /// Begin shutdown: workers stop draining and in-flight retries are
    /// abandoned at the next backoff boundary.
    fn stop(&self);
}
