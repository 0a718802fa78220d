//! Encoding-related error definitions

use thiserror::Error;

use crate::roi::{Region, RegionError};

/// Errors that can occur when serializing predictions
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("Preview needs a single z plane and time point, got {0}")]
    NotPlanar(Region),

    #[error("Channel {channel} out of range, buffer has {channels} channel(s)")]
    ChannelOutOfRange { channel: u64, channels: u64 },

    #[error("Cannot render an empty region {0}")]
    Empty(Region),

    #[error("Preview of {width}x{height} exceeds the PNG size limit")]
    PreviewTooLarge { width: u64, height: u64 },

    #[error("Invalid chunk key '{0}'")]
    InvalidChunkKey(String),

    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Region(#[from] RegionError),
}
