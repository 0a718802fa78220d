//! Prediction-related error definitions

use thiserror::Error;

use crate::classifier::ClassifierError;
use crate::datasource::DataSourceError;
use crate::registry::RegistryError;
use crate::roi::{Region, RegionError};

/// Errors that can occur while computing a prediction
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Invalid region: {0}")]
    InvalidRegion(#[from] RegionError),

    #[error("Tile {tile} failed: {source}")]
    TileComputation {
        tile: Region,
        source: ClassifierError,
    },

    #[error("Tiles cover {covered} cells of a region holding {expected}")]
    TileOverlap { expected: u64, covered: u64 },

    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    #[error("Internal prediction error: {0}")]
    Internal(String),
}
