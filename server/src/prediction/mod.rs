//! Prediction pipeline module
//!
//! This module provides:
//! - `PredictionService` computing classifier output over a region, tile by
//!   tile, on a shared rayon pool
//! - `check_coverage` asserting that tiles partition the requested region

mod pipeline;
mod types;

pub use pipeline::{PredictionService, build_pool, check_coverage};
pub use types::PredictionError;
