//! Test Utilities Module
//!
//! Shared fixtures for unit tests: synthetic data sources, annotations and
//! trained classifiers. Only compiled when running tests.

#![cfg(test)]

use std::sync::Arc;

use crate::classifier::{Annotation, FeatureExtractor, FeatureExtractorKind, PixelClassifier};
use crate::datasource::{ArrayDataSource, DataSource};
use crate::roi::{Axis, Buffer, Point5D, Region, Shape};

/// Tile shape of synthetic sources; deliberately not a divisor of their size
pub const TEST_TILE_SHAPE: Shape = Shape::spatial(7, 5, 2);

/// Data source whose sample at `(x, y, z, c)` is `f(x, y, z, c)`
pub fn source_from_fn(
    width: u64,
    height: u64,
    depth: u64,
    channels: u64,
    f: impl Fn(u64, u64, u64, u64) -> u8,
) -> ArrayDataSource {
    let region = Region::from_shape(&Shape::new(1, channels, width, height, depth));
    let mut data = Buffer::allocate(&region, 0).unwrap();
    for c in 0..channels {
        for z in 0..depth {
            for y in 0..height {
                for x in 0..width {
                    let point = Point5D::new(0, c as i64, x as i64, y as i64, z as i64);
                    data.set_at(&point, f(x, y, z, c));
                }
            }
        }
    }
    ArrayDataSource::new(data, TEST_TILE_SHAPE, "synthetic").unwrap()
}

/// Single channel source with a smooth but non-linear ramp
pub fn gradient_source(width: u64, height: u64, depth: u64) -> ArrayDataSource {
    source_from_fn(width, height, depth, 1, |x, y, z, _| {
        ((x * 7 + y * y + z * 31) % 256) as u8
    })
}

/// Dark left half, bright right half
pub fn two_phase_source(width: u64, height: u64, depth: u64) -> ArrayDataSource {
    source_from_fn(width, height, depth, 1, move |x, _, _, _| {
        if x < width / 2 { 20 } else { 220 }
    })
}

/// Label 1 on the second column, label 2 on the second to last one (z = 0)
pub fn two_phase_annotation(source: Arc<dyn DataSource>) -> Annotation {
    let full = source.full_region().shape().unwrap();
    let (width, height) = (full[Axis::X] as i64, full[Axis::Y] as i64);
    let region = Region::from_shape(&Shape::spatial(width as u64, height as u64, 1));
    let mut scribblings = Buffer::allocate(&region, 0).unwrap();
    for y in 0..height {
        scribblings.set_at(&Point5D::spatial(1, y, 0), 1);
        scribblings.set_at(&Point5D::spatial(width - 2, y, 0), 2);
    }
    Annotation::new(scribblings, source).unwrap()
}

/// Two-class classifier trained on [`two_phase_annotation`]
pub fn two_phase_classifier(source: Arc<dyn DataSource>) -> PixelClassifier {
    let annotation = Arc::new(two_phase_annotation(source));
    let extractors = vec![
        Arc::new(FeatureExtractor::new(FeatureExtractorKind::GaussianSmoothing, 0.7).unwrap()),
        Arc::new(FeatureExtractor::new(FeatureExtractorKind::HessianOfGaussian, 1.0).unwrap()),
    ];
    PixelClassifier::train(extractors, &[annotation]).unwrap()
}
