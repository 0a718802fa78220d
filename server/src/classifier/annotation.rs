//! Scribbling annotations tied to a data source

use std::collections::BTreeSet;
use std::sync::Arc;

use image::DynamicImage;

use crate::datasource::DataSource;
use crate::roi::{Axis, Buffer, Interval, Point5D, Region, Shape};

use super::types::AnnotationError;

/// RGB color with components in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    components: [f32; 3],
}

impl Color {
    pub fn new(r: f32, g: f32, b: f32) -> Result<Self, AnnotationError> {
        let components = [r, g, b];
        if components.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err(AnnotationError::InvalidColor(components));
        }
        Ok(Self { components })
    }

    /// Components scaled to 8 bits (truncating)
    pub fn to_rgb8(&self) -> [u8; 3] {
        self.components.map(|v| (v * 255.0) as u8)
    }

    /// Label value stored in scribblings for this color; never 0, which
    /// marks unlabeled pixels
    pub fn label(&self) -> u8 {
        let mut hash: u32 = 0x811c_9dc5;
        for byte in self.to_rgb8() {
            hash = (hash ^ byte as u32).wrapping_mul(0x0100_0193);
        }
        (hash % 255) as u8 + 1
    }
}

/// Fail unless the spatial extent of `region` lies inside `source`
fn check_bounds(region: &Region, source: &dyn DataSource) -> Result<(), AnnotationError> {
    let bounds = source.full_region();
    let spatial_bounds = bounds
        .with(Axis::C, region.get(Axis::C))
        .with(Axis::T, region.get(Axis::T));
    if !spatial_bounds.contains(region) {
        return Err(AnnotationError::OutOfBounds {
            scribblings: *region,
            bounds,
        });
    }
    Ok(())
}

/// Sparse single-channel labels over part of a data source
#[derive(Debug)]
pub struct Annotation {
    scribblings: Buffer,
    data_source: Arc<dyn DataSource>,
}

impl Annotation {
    pub fn new(scribblings: Buffer, data_source: Arc<dyn DataSource>) -> Result<Self, AnnotationError> {
        let region = *scribblings.region();
        if region.shape()?.get(Axis::C) != 1 || region.shape()?.get(Axis::T) != 1 {
            return Err(AnnotationError::NotSingleChannel(region));
        }
        check_bounds(&region, data_source.as_ref())?;
        Ok(Self {
            scribblings,
            data_source,
        })
    }

    /// A line annotation: both inclusive endpoints are labeled with the
    /// color's label inside their bounding box
    pub fn from_line(
        color: Color,
        a: Point5D,
        b: Point5D,
        data_source: Arc<dyn DataSource>,
    ) -> Result<Self, AnnotationError> {
        let region = Region::bounding_box(&a, &b)?
            .with(Axis::T, Interval::single(0))
            .with(Axis::C, Interval::single(0));
        check_bounds(&region, data_source.as_ref())?;
        let mut scribblings = Buffer::allocate(&region, 0)?;
        let label = color.label();
        for point in [a, b] {
            let colored = Buffer::allocate(&Region::at(&point.with(Axis::T, 0).with(Axis::C, 0)), label)?;
            scribblings.write_cropped(&colored);
        }
        Self::new(scribblings, data_source)
    }

    /// Labels from a grayscale (or converted-to-grayscale) image placed at
    /// `offset` in the x/y plane
    pub fn from_image_bytes(
        bytes: &[u8],
        offset: Point5D,
        data_source: Arc<dyn DataSource>,
    ) -> Result<Self, AnnotationError> {
        let decoded = image::load_from_memory(bytes).map_err(|e| AnnotationError::Decode(e.to_string()))?;
        let (width, height) = (decoded.width() as u64, decoded.height() as u64);
        let labels = DynamicImage::into_luma8(decoded).into_raw();
        let region = Region::from_start_shape(
            &offset.with(Axis::T, 0).with(Axis::C, 0),
            &Shape::spatial(width, height, 1),
        );
        let scribblings = Buffer::from_vec(&region, labels)?;
        Self::new(scribblings, data_source)
    }

    pub fn scribblings(&self) -> &Buffer {
        &self.scribblings
    }

    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        &self.data_source
    }

    /// Distinct non-zero labels
    pub fn labels(&self) -> BTreeSet<u8> {
        self.scribblings
            .as_slice()
            .iter()
            .copied()
            .filter(|v| *v != 0)
            .collect()
    }
}
