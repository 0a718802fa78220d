//! Output encodings for predictions
//!
//! This module provides:
//! - PNG previews of one channel of a planar buffer
//! - The raw chunk protocol (chunk keys, column-major `u8` bodies)
//! - `VolumeInfo` metadata describing the chunked volume
//! - `ChunkCache` for encoded chunk bodies

mod chunk;
mod chunk_cache;
mod info;
mod preview;
mod types;

pub use chunk::{ChunkKey, RAW_CHUNK_AXES, decode_raw_chunk, encode_raw_chunk};
pub use chunk_cache::{ChunkCache, ChunkCacheConfig, ChunkCacheKey, ChunkCacheStats};
pub use info::{ScaleInfo, VolumeInfo};
pub use preview::encode_preview;
pub use types::EncodingError;
