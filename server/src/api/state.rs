//! Shared application state

use std::sync::Arc;
use std::time::Instant;

use rayon::ThreadPool;

use crate::config::Config;
use crate::encoding::{ChunkCache, ChunkCacheConfig};
use crate::prediction::{PredictionService, build_pool};
use crate::registry::{ObjectRegistry, RegistryDefaults};

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ObjectRegistry>,
    pub predictions: PredictionService,
    pub chunk_cache: Arc<ChunkCache>,
    /// Edge length of advertised raw chunks
    pub chunk_size: u64,
    /// Request body limit for uploads
    pub max_upload_size: usize,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(registry: Arc<ObjectRegistry>, pool: Arc<ThreadPool>, chunk_cache: Arc<ChunkCache>) -> Self {
        let defaults = Config::default();
        Self {
            predictions: PredictionService::new(registry.clone(), pool),
            registry,
            chunk_cache,
            chunk_size: defaults.encoding.chunk_size,
            max_upload_size: defaults.upload.max_upload_size,
            started_at: Instant::now(),
        }
    }

    /// Build every shared component from `config`
    pub fn from_config(config: &Config) -> Result<Self, rayon::ThreadPoolBuildError> {
        let registry = Arc::new(ObjectRegistry::new(RegistryDefaults {
            tile_shape: config.prediction.default_tile_shape,
        }));
        let pool = Arc::new(build_pool(config.prediction.worker_threads)?);
        let chunk_cache = Arc::new(ChunkCache::new(ChunkCacheConfig {
            max_size_bytes: config.encoding.chunk_cache_max_bytes,
            tti: config.encoding.chunk_cache_tti,
        }));

        let mut state = Self::new(registry, pool, chunk_cache);
        state.chunk_size = config.encoding.chunk_size;
        state.max_upload_size = config.upload.max_upload_size;
        Ok(state)
    }
}
