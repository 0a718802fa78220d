//! Classifier-related error definitions

use thiserror::Error;

use crate::datasource::DataSourceError;
use crate::roi::{Region, RegionError};

/// Errors raised while computing features
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Sigma must lie in (0, 64], got {0}")]
    InvalidSigma(f32),

    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    #[error(transparent)]
    Region(#[from] RegionError),
}

/// Errors raised while building annotations
#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("Scribblings {scribblings} are outside data source bounds {bounds}")]
    OutOfBounds { scribblings: Region, bounds: Region },

    #[error("Scribblings must span one time point and one channel, got {0}")]
    NotSingleChannel(Region),

    #[error("Color components must lie in [0, 1], got {0:?}")]
    InvalidColor([f32; 3]),

    #[error("Failed to decode scribblings: {0}")]
    Decode(String),

    #[error(transparent)]
    Region(#[from] RegionError),
}

/// Errors raised while training or applying a pixel classifier
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("A pixel classifier needs at least one feature extractor")]
    NoFeatureExtractors,

    #[error("Annotations contain no labeled pixels")]
    NoLabels,

    #[error("Feature count mismatch: classifier expects {expected}, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Region(#[from] RegionError),
}
