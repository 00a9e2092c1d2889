//! Sharded write queues and fan-out read path.

use super::backend::{Row, RowSelect, WideColumnBackend};
use super::{
    row_key, telemetry, ChunkWriteRequest, PersistNotification, Store, StoreConfig, MONTH_SECONDS,
};
use crate::chunk::{Format, IterGen};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const BASE_BACKOFF_MS: u64 = 100;
const MAX_BACKOFF_MS: u64 = 2_000;
const PERSIST_CHANNEL_SIZE: usize = 1_024;

/// Deterministic shard selector. FNV-1a rather than the byte sum the row
/// format inherited, so short ids with similar characters spread evenly;
/// routing stays stable per key, which serializes writes per metric.
fn shard_for(key: &str, shards: usize) -> usize {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for b in key.as_bytes() {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(PRIME);
    }
    (hash % shards as u64) as usize
}

struct ReadRequest {
    sort_key: u32,
    select: RowSelect,
    out: mpsc::Sender<ReadOutcome>,
}

struct ReadOutcome {
    sort_key: u32,
    rows: Result<Vec<Row>>,
}

/// Chunk store over a wide-column backend.
pub struct ChunkStore {
    config: StoreConfig,
    write_queues: Vec<mpsc::Sender<ChunkWriteRequest>>,
    read_queue: mpsc::Sender<ReadRequest>,
    persist_tx: broadcast::Sender<PersistNotification>,
    shutdown: CancellationToken,
}

impl ChunkStore {
    pub fn new(config: StoreConfig, backend: Arc<dyn WideColumnBackend>) -> Result<Self> {
        if config.write_workers == 0 || config.read_workers == 0 {
            return Err(Error::Config(
                "store needs at least one write and one read worker".to_string(),
            ));
        }

        let shutdown = CancellationToken::new();
        let (persist_tx, _) = broadcast::channel(PERSIST_CHANNEL_SIZE);

        let mut write_queues = Vec::with_capacity(config.write_workers);
        for shard in 0..config.write_workers {
            let (tx, rx) = mpsc::channel(config.write_queue_size);
            write_queues.push(tx);
            tokio::spawn(process_write_queue(
                shard,
                rx,
                Arc::clone(&backend),
                persist_tx.clone(),
                config.backend_timeout,
                shutdown.clone(),
            ));
        }

        let (read_tx, read_rx) = mpsc::channel(config.read_queue_size);
        let read_rx = Arc::new(tokio::sync::Mutex::new(read_rx));
        for _ in 0..config.read_workers {
            tokio::spawn(process_read_queue(
                Arc::clone(&read_rx),
                Arc::clone(&backend),
                config.backend_timeout,
                shutdown.clone(),
            ));
        }

        // 1 Hz read queue depth sampling; write shards sample from their
        // own receivers
        let depth_tx = read_tx.clone();
        let depth_queue_size = config.read_queue_size;
        let depth_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = depth_shutdown.cancelled() => break,
                    _ = tick.tick() => {
                        let depth = depth_queue_size.saturating_sub(depth_tx.capacity());
                        telemetry::record_read_queue_depth(depth as u64);
                    }
                }
            }
        });

        Ok(Self {
            config,
            write_queues,
            read_queue: read_tx,
            persist_tx,
            shutdown,
        })
    }

    /// Subscribe to successful chunk persists.
    pub fn subscribe_persist(&self) -> broadcast::Receiver<PersistNotification> {
        self.persist_tx.subscribe()
    }
}

#[async_trait]
impl Store for ChunkStore {
    async fn add(&self, cwr: ChunkWriteRequest) -> Result<()> {
        let shard = shard_for(&cwr.key, self.write_queues.len());
        let tx = &self.write_queues[shard];
        tx.send(cwr)
            .await
            .map_err(|_| Error::Backend("store write queue closed".to_string()))?;
        let depth = self.config.write_queue_size.saturating_sub(tx.capacity());
        telemetry::record_write_queue_depth(shard, depth as u64);
        Ok(())
    }

    async fn search(
        &self,
        token: &CancellationToken,
        key: &str,
        _ttl: u32,
        start: u32,
        end: u32,
    ) -> Result<Vec<IterGen>> {
        if start > end {
            return Err(Error::BadRequest(format!(
                "search start {start} is after end {end}"
            )));
        }
        if start == end {
            return Ok(Vec::new());
        }
        let timer = Instant::now();

        // The table only knows chunk start timestamps. The last needed
        // chunk is easy (largest t0 < end); the first is the newest chunk
        // at or before start, which is guaranteed to live in start's own
        // row because every chunk span divides the row span.
        let start_month = start - (start % MONTH_SECONDS);
        let end_month = (end - 1) - ((end - 1) % MONTH_SECONDS);

        let mut queries: Vec<(u32, RowSelect)> = Vec::new();
        queries.push((
            start_month,
            RowSelect::TsAtOrBefore {
                key: row_key(key, start_month),
                ts: start,
            },
        ));

        if start_month == end_month {
            queries.push((
                start_month + 1,
                RowSelect::TsRangeOpen {
                    key: row_key(key, start_month),
                    after: start,
                    before: end,
                },
            ));
        } else {
            let mut month = start_month;
            while month <= end_month {
                let rk = row_key(key, month);
                if month == start_month {
                    queries.push((month + 1, RowSelect::TsFrom { key: rk, from: start + 1 }));
                } else if month == end_month {
                    queries.push((month, RowSelect::TsThrough { key: rk, through: end - 1 }));
                } else {
                    queries.push((month, RowSelect::All { key: rk }));
                }
                match month.checked_add(MONTH_SECONDS) {
                    Some(next) => month = next,
                    None => break,
                }
            }
        }

        let num_queries = queries.len();
        let (out_tx, mut out_rx) = mpsc::channel(num_queries);
        for (sort_key, select) in queries {
            let req = ReadRequest {
                sort_key,
                select,
                out: out_tx.clone(),
            };
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    discard_outcomes(out_rx);
                    return Err(Error::Canceled);
                }
                sent = self.read_queue.send(req) => {
                    sent.map_err(|_| Error::Backend("store read queue closed".to_string()))?;
                }
            }
            let depth = self
                .config
                .read_queue_size
                .saturating_sub(self.read_queue.capacity());
            telemetry::record_read_queue_depth(depth as u64);
        }
        drop(out_tx);

        // consume exactly as many outcomes as queries were issued; they
        // arrive in completion order
        let mut outcomes = Vec::with_capacity(num_queries);
        for _ in 0..num_queries {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    discard_outcomes(out_rx);
                    return Err(Error::Canceled);
                }
                outcome = out_rx.recv() => match outcome {
                    Some(o) => outcomes.push(o),
                    None => {
                        return Err(Error::Backend(
                            "read workers went away mid-search".to_string(),
                        ))
                    }
                }
            }
        }

        outcomes.sort_by_key(|o| o.sort_key);

        let mut itergens = Vec::new();
        for outcome in outcomes {
            let rows = outcome.rows?;
            telemetry::record_chunks_per_row(rows.len());
            for row in rows {
                match IterGen::from_payload(row.ts, 0, row.data) {
                    Ok(ig) => itergens.push(ig),
                    Err(e) => {
                        warn!(key, ts = row.ts, error = %e, "skipping unreadable chunk");
                        telemetry::record_corrupt_chunk();
                    }
                }
            }
        }

        telemetry::record_search(num_queries, itergens.len(), timer.elapsed().as_secs_f64());
        debug!(
            key,
            start,
            end,
            queries = num_queries,
            chunks = itergens.len(),
            "store search done"
        );
        Ok(itergens)
    }

    fn stop(&self) {
        self.shutdown.cancel();
    }
}

/// Outstanding sub-query outcomes of an abandoned search are drained off
/// the channel so read workers never block on a dead caller.
fn discard_outcomes(mut rx: mpsc::Receiver<ReadOutcome>) {
    tokio::spawn(async move { while rx.recv().await.is_some() {} });
}

async fn process_write_queue(
    shard: usize,
    mut rx: mpsc::Receiver<ChunkWriteRequest>,
    backend: Arc<dyn WideColumnBackend>,
    persist_tx: broadcast::Sender<PersistNotification>,
    backend_timeout: Duration,
    shutdown: CancellationToken,
) {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tick.tick() => {
                telemetry::record_write_queue_depth(shard, rx.len() as u64);
            }
            cwr = rx.recv() => {
                let Some(cwr) = cwr else { break };
                telemetry::record_write_queue_depth(shard, rx.len() as u64);
                telemetry::record_write_queue_wait(cwr.enqueued.elapsed().as_secs_f64());
                save_chunk(&*backend, &persist_tx, backend_timeout, &shutdown, cwr).await;
            }
        }
    }
}

/// Persist one chunk, retrying with capped backoff until it succeeds or
/// shutdown is requested. The version tag is prepended here so everything
/// upstream deals in bare streams.
async fn save_chunk(
    backend: &dyn WideColumnBackend,
    persist_tx: &broadcast::Sender<PersistNotification>,
    backend_timeout: Duration,
    shutdown: &CancellationToken,
    cwr: ChunkWriteRequest,
) {
    let mut payload = Vec::with_capacity(cwr.payload.len() + 1);
    payload.push(Format::StandardZip.tag());
    payload.extend_from_slice(&cwr.payload);
    let payload = Bytes::from(payload);
    let rk = row_key(&cwr.key, cwr.t0);

    let mut attempts: u32 = 0;
    loop {
        let res = tokio::time::timeout(
            backend_timeout,
            backend.insert(&rk, cwr.t0, payload.clone(), cwr.ttl),
        )
        .await;
        let err = match res {
            Ok(Ok(())) => {
                cwr.saved.store(true, Ordering::Release);
                let _ = persist_tx.send(PersistNotification {
                    key: cwr.key.clone(),
                    t0: cwr.t0,
                });
                telemetry::record_chunk_save("ok");
                debug!(key = %cwr.key, t0 = cwr.t0, "chunk saved");
                return;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("insert timed out after {backend_timeout:?}"),
        };

        telemetry::record_chunk_save("fail");
        if attempts % 20 == 0 {
            warn!(
                key = %cwr.key,
                t0 = cwr.t0,
                attempt = attempts + 1,
                error = %err,
                "failed to save chunk, will retry"
            );
        }

        let backoff = (BASE_BACKOFF_MS << attempts.min(5)).min(MAX_BACKOFF_MS);
        tokio::time::sleep(Duration::from_millis(backoff)).await;
        if shutdown.is_cancelled() {
            warn!(key = %cwr.key, t0 = cwr.t0, "abandoning chunk save on shutdown");
            return;
        }
        attempts += 1;
    }
}

async fn process_read_queue(
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<ReadRequest>>>,
    backend: Arc<dyn WideColumnBackend>,
    backend_timeout: Duration,
    shutdown: CancellationToken,
) {
    loop {
        let req = tokio::select! {
            _ = shutdown.cancelled() => break,
            req = async { rx.lock().await.recv().await } => req,
        };
        let Some(ReadRequest {
            sort_key,
            select,
            out,
        }) = req
        else {
            break;
        };

        let rows = match tokio::time::timeout(backend_timeout, backend.select(select)).await {
            Ok(res) => res,
            Err(_) => Err(Error::Backend(format!(
                "select timed out after {backend_timeout:?}"
            ))),
        };
        let _ = out.send(ReadOutcome { sort_key, rows }).await;
    }
}
