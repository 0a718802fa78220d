//! Data source types and error definitions

use serde::Serialize;
use thiserror::Error;

use crate::roi::{Region, RegionError};

/// Errors that can occur when reading from a data source
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("Requested region {requested} is outside data source bounds {bounds}")]
    OutOfBounds { requested: Region, bounds: Region },

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Invalid data source shape: {0}")]
    InvalidShape(String),

    #[error(transparent)]
    Region(#[from] RegionError),
}

/// Summary of a data source for listings
#[derive(Debug, Clone, Serialize)]
pub struct DataSourceDescriptor {
    /// How the samples were provided ("png", "jpeg", "raw", ...)
    pub format: String,
    /// Full extent in x, y, z
    pub size: [u64; 3],
    /// Number of channels
    pub num_channels: u64,
    /// Intrinsic tile extent in x, y, z
    pub tile_shape: [u64; 3],
}
