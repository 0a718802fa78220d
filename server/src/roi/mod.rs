//! Region-of-interest algebra
//!
//! This module provides:
//! - `Axis` and `Point5D` for addressing the five named axes (t, c, x, y, z)
//! - `Interval`, `Region` and `Shape` value types with clamp/translate/tiling
//! - `Array5` dense buffers with autocrop writes and axis-order serialization

mod array;
mod point;
mod region;

pub use array::{Array5, Buffer, Element, FeatureArray};
pub use point::{Axis, Point5D};
pub use region::{Interval, Region, RegionError, Shape, Tiles, UNBOUNDED_START, UNBOUNDED_STOP};
