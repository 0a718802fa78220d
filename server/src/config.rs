//! Server configuration
//!
//! Configuration is loaded from environment variables; every field has a
//! default so the server starts without any.

use std::env;
use std::thread;
use std::time::Duration;

use crate::roi::{Axis, Shape};

/// Main server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,
    /// Server port
    pub port: u16,

    /// Prediction pipeline configuration
    pub prediction: PredictionConfig,

    /// Output encoding configuration
    pub encoding: EncodingConfig,

    /// Upload configuration
    pub upload: UploadConfig,
}

/// Prediction-related configuration
#[derive(Debug, Clone)]
pub struct PredictionConfig {
    /// Threads in the shared tile worker pool
    pub worker_threads: usize,
    /// Tile shape of data sources created without an explicit one
    pub default_tile_shape: Shape,
}

/// Encoding-related configuration
#[derive(Debug, Clone)]
pub struct EncodingConfig {
    /// Edge length of the cubic chunks advertised in volume metadata
    pub chunk_size: u64,
    /// Maximum total size of cached raw chunks in bytes
    pub chunk_cache_max_bytes: u64,
    /// Evict cached chunks not read for this long
    pub chunk_cache_tti: Duration,
}

/// Upload-related configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum request body size in bytes
    pub max_upload_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            prediction: PredictionConfig::default(),
            encoding: EncodingConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            worker_threads: thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
            default_tile_shape: Shape::spatial(256, 256, 1),
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64,
            chunk_cache_max_bytes: 256 * 1024 * 1024, // 256 MB
            chunk_cache_tti: Duration::from_secs(30 * 60),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 512 * 1024 * 1024, // 512 MB
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Server config
        if let Ok(host) = env::var("HOST") {
            config.host = host;
        }
        if let Ok(port) = env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        // Prediction config
        if let Ok(val) = env::var("PREDICTION_WORKERS")
            && let Ok(n) = val.parse::<usize>()
            && n > 0
        {
            config.prediction.worker_threads = n;
        }
        let tile = config.prediction.default_tile_shape;
        let mut tile_xy = tile.get(Axis::X);
        let mut tile_z = tile.get(Axis::Z);
        if let Ok(val) = env::var("TILE_SIZE_XY")
            && let Ok(size) = val.parse::<u64>()
            && size > 0
        {
            tile_xy = size;
        }
        if let Ok(val) = env::var("TILE_SIZE_Z")
            && let Ok(size) = val.parse::<u64>()
            && size > 0
        {
            tile_z = size;
        }
        config.prediction.default_tile_shape = Shape::spatial(tile_xy, tile_xy, tile_z);

        // Encoding config
        if let Ok(val) = env::var("CHUNK_SIZE")
            && let Ok(size) = val.parse::<u64>()
            && size > 0
        {
            config.encoding.chunk_size = size;
        }
        if let Ok(val) = env::var("CHUNK_CACHE_MAX_MB")
            && let Ok(mb) = val.parse::<u64>()
        {
            config.encoding.chunk_cache_max_bytes = mb * 1024 * 1024;
        }

        // Upload config
        if let Ok(val) = env::var("MAX_UPLOAD_MB")
            && let Ok(mb) = val.parse::<usize>()
        {
            config.upload.max_upload_size = mb * 1024 * 1024;
        }

        config
    }
}
