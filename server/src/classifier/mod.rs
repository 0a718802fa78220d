//! Feature extraction, annotations and pixel classification
//!
//! This module provides:
//! - `FeatureExtractor` with a closed set of in-plane filter kinds
//! - `Annotation` scribblings tied to a data source, and line annotations
//! - `PixelClassifier` trained from annotations, predicting tile by tile

mod annotation;
mod features;
mod pixel;
mod types;

pub use annotation::{Annotation, Color};
pub use features::{FeatureExtractor, FeatureExtractorKind};
pub use pixel::PixelClassifier;
pub use types::{AnnotationError, ClassifierError, FeatureError};
