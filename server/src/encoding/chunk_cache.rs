//! Byte-weighted cache of encoded raw chunks
//!
//! Classifiers and data sources never change once registered, so an encoded
//! chunk stays valid for as long as both ids exist.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use metrics::{counter, gauge};
use moka::future::Cache;

use super::chunk::ChunkKey;

/// Cache key: one chunk of one classifier applied to one data source
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ChunkCacheKey {
    pub classifier_id: String,
    pub data_source_id: String,
    pub chunk: ChunkKey,
}

#[derive(Debug, Clone)]
pub struct ChunkCacheConfig {
    /// Maximum total size of cached chunk bodies
    pub max_size_bytes: u64,
    /// Evict entries not read for this long
    pub tti: Duration,
}

impl Default for ChunkCacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 256 * 1024 * 1024,
            tti: Duration::from_secs(1800),
        }
    }
}

/// Thread-safe chunk cache using moka
pub struct ChunkCache {
    cache: Cache<ChunkCacheKey, Bytes>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ChunkCache {
    pub fn new(config: ChunkCacheConfig) -> Self {
        let cache = Cache::builder()
            .weigher(|_key: &ChunkCacheKey, value: &Bytes| -> u32 {
                value.len().min(u32::MAX as usize) as u32
            })
            .max_capacity(config.max_size_bytes)
            .time_to_idle(config.tti)
            .build();

        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, key: &ChunkCacheKey) -> Option<Bytes> {
        let result = self.cache.get(key).await;

        if result.is_some() {
            let hits = self.hits.fetch_add(1, Ordering::Relaxed) + 1;
            counter!("ndpredict_chunk_cache_hits_total").increment(1);
            if hits % 100 == 0 {
                self.update_gauges();
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            counter!("ndpredict_chunk_cache_misses_total").increment(1);
        }

        result
    }

    pub async fn insert(&self, key: ChunkCacheKey, value: Bytes) {
        let size = value.len();
        self.cache.insert(key, value).await;
        counter!("ndpredict_chunk_cache_bytes_inserted_total").increment(size as u64);
    }

    /// Cached chunk, or the result of `init` which is cached on success
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: ChunkCacheKey, init: F) -> Result<Bytes, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Bytes, E>>,
    {
        if let Some(cached) = self.get(&key).await {
            return Ok(cached);
        }
        let value = init().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    /// Hit rate in `[0, 1]`
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn stats(&self) -> ChunkCacheStats {
        ChunkCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.cache.entry_count(),
            weighted_size: self.cache.weighted_size(),
        }
    }

    fn update_gauges(&self) {
        gauge!("ndpredict_chunk_cache_hit_rate").set(self.hit_rate());
        gauge!("ndpredict_chunk_cache_entry_count").set(self.cache.entry_count() as f64);
        gauge!("ndpredict_chunk_cache_size_bytes").set(self.cache.weighted_size() as f64);
    }
}

impl Default for ChunkCache {
    fn default() -> Self {
        Self::new(ChunkCacheConfig::default())
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChunkCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
    /// Approximate bytes held
    pub weighted_size: u64,
}
