//! # Chunkvault
//!
//! A multi-tenant time-series storage core: sealed metric chunks go into a
//! memory cache and a wide-column backed persistent store, and a per-tenant
//! index answers Graphite-style queries over the metric namespace.
//!
//! ## Architecture
//!
//! - **Chunk codec**: compressed `(timestamp, value)` streams behind
//!   reusable iterator handles
//! - **Chunk cache**: per-metric linked chunk maps with range search, under
//!   a global LRU byte accountant
//! - **Chunk store**: sharded write queues with indefinite retry, fan-out
//!   reads merged into chronological order, over month-sharded wide rows
//! - **Metric index**: per-tenant path tree with glob/brace/class pattern
//!   matching and tag filters
//!
//! The ingest pipeline seals chunks elsewhere and hands them to the cache
//! and store together; the query path searches the cache first and fills
//! whatever gap remains from the store.

pub mod cache;
pub mod chunk;
pub mod config;
pub mod idx;
pub mod retention;
pub mod store;
pub mod telemetry;

mod error;

pub use error::{Error, Result};

/// Configuration for the Chunkvault storage core
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Chunk cache configuration
    pub cache: cache::CacheConfig,
    /// Chunk store configuration
    pub store: store::StoreConfig,
    /// Metric index configuration
    pub index: idx::IndexConfig,
}

/// Re-exports for convenience
pub mod prelude {
    pub use crate::cache::{CacheConfig, CCSearchResult, ChunkCache};
    pub use crate::chunk::{ChunkEncoder, Format, IterGen};
    pub use crate::idx::{
        IndexConfig, MemoryIndex, MetricData, MetricDefinition, MetricIndex, Node,
    };
    pub use crate::retention::{AggMethod, Retention, Schemas};
    pub use crate::store::{
        ChunkStore, ChunkWriteRequest, MemoryBackend, Store, StoreConfig, MONTH_SECONDS,
    };
    pub use crate::{Config, Error, Result};
}
