//! Component factory for environment-based configuration
//!
//! Builds the wide-column backend and the components over it from
//! environment variables, so development setups come up with zero
//! configuration and deployments can swap the storage driver without code
//! changes.

use crate::cache::{CacheConfig, ChunkCache};
use crate::idx::{IndexConfig, MemoryIndex};
use crate::store::{ChunkStore, MemoryBackend, StoreConfig, WideColumnBackend};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::info;

pub struct ComponentFactory;

impl ComponentFactory {
    /// Create the wide-column backend from environment
    ///
    /// Environment variables:
    /// - STORE_BACKEND: "memory" (default)
    ///
    /// Deployments with a real wide-column cluster register their own
    /// [`WideColumnBackend`] implementation and pass it to
    /// [`ChunkStore::new`] directly instead of going through this factory.
    pub fn create_backend() -> Result<Arc<dyn WideColumnBackend>> {
        let backend = std::env::var("STORE_BACKEND").unwrap_or_else(|_| "memory".to_string());

        match backend.as_str() {
            "memory" => {
                info!("using in-memory wide-column backend (development mode)");
                Ok(Arc::new(MemoryBackend::new()))
            }
            _ => Err(Error::Config(format!(
                "unknown STORE_BACKEND: {backend}. Use 'memory'"
            ))),
        }
    }

    /// Create a chunk store over the environment-selected backend.
    pub fn create_store(config: StoreConfig) -> Result<ChunkStore> {
        ChunkStore::new(config, Self::create_backend()?)
    }

    /// Create the chunk cache.
    pub fn create_cache(config: CacheConfig) -> ChunkCache {
        ChunkCache::new(config)
    }

    /// Create the metric index.
    pub fn create_index(config: IndexConfig) -> MemoryIndex {
        MemoryIndex::new(config)
    }
}
