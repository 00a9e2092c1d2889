//! Wide-column backend abstraction.
//!
//! The chunk store talks to its backing table through this trait so the
//! concrete driver stays a deployment concern. The table contract is a
//! wide row per metric and month with one column per chunk:
//!
//! ```text
//! keyspace  : raintank
//! table     : metric
//! columns   : key ascii, ts int, data blob
//! primary   : (key, ts)
//! clustering: ts DESC
//! ```
//!
//! [`MemoryBackend`] implements the same row and clustering semantics in
//! process for development and tests.

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

/// DDL the deployment is expected to have applied, kept here as the
/// single source of truth for the row layout the store assumes.
pub const KEYSPACE_SCHEMA: &str = "CREATE KEYSPACE IF NOT EXISTS raintank WITH replication = {'class': 'SimpleStrategy', 'replication_factor': 1} AND durable_writes = true";
pub const TABLE_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS raintank.metric (key ascii, ts int, data blob, PRIMARY KEY (key, ts)) WITH CLUSTERING ORDER BY (ts DESC)";

/// One column of a wide row: a chunk's start timestamp and payload.
#[derive(Debug, Clone)]
pub struct Row {
    pub ts: u32,
    pub data: Bytes,
}

/// The five row selections the read path issues.
///
/// All variants return columns in ascending `ts` order; `TsAtOrBefore`
/// returns at most the single newest column at or before `ts`.
#[derive(Debug, Clone)]
pub enum RowSelect {
    /// `ts <= ? LIMIT 1` against the descending clustering order.
    TsAtOrBefore { key: String, ts: u32 },
    /// `ts > ? AND ts < ?`, both exclusive.
    TsRangeOpen { key: String, after: u32, before: u32 },
    /// `ts >= ?`.
    TsFrom { key: String, from: u32 },
    /// `ts <= ?`.
    TsThrough { key: String, through: u32 },
    /// The whole row.
    All { key: String },
}

impl RowSelect {
    pub fn key(&self) -> &str {
        match self {
            RowSelect::TsAtOrBefore { key, .. }
            | RowSelect::TsRangeOpen { key, .. }
            | RowSelect::TsFrom { key, .. }
            | RowSelect::TsThrough { key, .. }
            | RowSelect::All { key } => key,
        }
    }
}

/// Backend interface: idempotent upserts and row-range selections.
#[async_trait]
pub trait WideColumnBackend: Send + Sync + std::fmt::Debug {
    /// Upsert one column. `ttl` is in seconds; 0 means no expiry.
    async fn insert(&self, key: &str, ts: u32, data: Bytes, ttl: u32) -> Result<()>;

    /// Execute one selection against a single row.
    async fn select(&self, select: RowSelect) -> Result<Vec<Row>>;
}

#[derive(Debug, Clone)]
struct Cell {
    data: Bytes,
    expires_at: Option<Instant>,
}

impl Cell {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

fn collect_live<'a>(iter: impl Iterator<Item = (&'a u32, &'a Cell)>, now: Instant) -> Vec<Row> {
    iter.filter(|(_, cell)| cell.live(now))
        .map(|(&ts, cell)| Row {
            ts,
            data: cell.data.clone(),
        })
        .collect()
}

/// In-memory wide-column table with per-cell TTLs.
///
/// Failure injection: `fail_next(n)` makes the next `n` inserts fail with
/// a backend error, `fail_next_selects(n)` does the same for selections,
/// for exercising the retry and error propagation paths in tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    rows: RwLock<HashMap<String, BTreeMap<u32, Cell>>>,
    fail_inserts: AtomicU32,
    fail_selects: AtomicU32,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` inserts.
    pub fn fail_next(&self, n: u32) {
        self.fail_inserts.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` selections.
    pub fn fail_next_selects(&self, n: u32) {
        self.fail_selects.store(n, Ordering::SeqCst);
    }

    /// Number of live columns across all rows.
    pub fn column_count(&self) -> usize {
        let now = Instant::now();
        self.rows
            .read()
            .values()
            .map(|row| row.values().filter(|c| c.live(now)).count())
            .sum()
    }
}

#[async_trait]
impl WideColumnBackend for MemoryBackend {
    async fn insert(&self, key: &str, ts: u32, data: Bytes, ttl: u32) -> Result<()> {
        let remaining = self.fail_inserts.load(Ordering::SeqCst);
        if remaining > 0
            && self
                .fail_inserts
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(Error::Backend("injected insert failure".to_string()));
        }

        let expires_at =
            (ttl > 0).then(|| Instant::now() + std::time::Duration::from_secs(u64::from(ttl)));
        let mut rows = self.rows.write();
        rows.entry(key.to_string())
            .or_default()
            .insert(ts, Cell { data, expires_at });
        Ok(())
    }

    async fn select(&self, select: RowSelect) -> Result<Vec<Row>> {
        let remaining = self.fail_selects.load(Ordering::SeqCst);
        if remaining > 0
            && self
                .fail_selects
                .compare_exchange(remaining, remaining - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            return Err(Error::Backend("injected select failure".to_string()));
        }

        let now = Instant::now();
        let rows = self.rows.read();
        let Some(row) = rows.get(select.key()) else {
            return Ok(Vec::new());
        };

        let out = match select {
            RowSelect::TsAtOrBefore { ts, .. } => {
                // newest column at or before ts, per the DESC clustering
                row.range(..=ts)
                    .rev()
                    .find(|(_, cell)| cell.live(now))
                    .map(|(&ts, cell)| Row {
                        ts,
                        data: cell.data.clone(),
                    })
                    .into_iter()
                    .collect()
            }
            RowSelect::TsRangeOpen { after, before, .. } => {
                if before <= after + 1 {
                    Vec::new()
                } else {
                    collect_live(row.range(after + 1..before), now)
                }
            }
            RowSelect::TsFrom { from, .. } => collect_live(row.range(from..), now),
            RowSelect::TsThrough { through, .. } => collect_live(row.range(..=through), now),
            RowSelect::All { .. } => collect_live(row.range(..), now),
        };
        Ok(out)
    }
}
