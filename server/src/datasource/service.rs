//! DataSource trait definition

use std::fmt;

use crate::roi::{Axis, Buffer, Region, Shape, Tiles};

use super::types::{DataSourceDescriptor, DataSourceError};

/// Addressable volume of 8-bit samples
pub trait DataSource: Send + Sync + fmt::Debug {
    /// Bounded region covering every sample
    fn full_region(&self) -> Region;

    /// Intrinsic tiling grid; `t` and `c` extents are ignored by
    /// [`DataSource::tiles`], which always spans one time point and all channels
    fn tile_shape(&self) -> Shape;

    /// Materialize samples for a sub-region of [`DataSource::full_region`]
    fn retrieve(&self, roi: &Region) -> Result<Buffer, DataSourceError>;

    fn descriptor(&self) -> DataSourceDescriptor;

    fn num_channels(&self) -> u64 {
        self.full_region().get(Axis::C).len().unwrap_or(0)
    }

    /// Disjoint tiles exactly covering the full region
    fn tiles(&self) -> Result<Tiles, DataSourceError> {
        let full = self.full_region();
        let tile_shape = self
            .tile_shape()
            .with(Axis::T, 1)
            .with(Axis::C, self.num_channels());
        Ok(full.tiles(tile_shape)?)
    }
}
