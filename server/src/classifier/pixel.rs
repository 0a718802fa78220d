//! Nearest-centroid pixel classifier
//!
//! Training averages the feature vectors of every labeled pixel per label.
//! Prediction assigns each pixel a probability per class proportional to the
//! inverse squared distance to the class centroid, scaled to `0..=255`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::datasource::DataSource;
use crate::roi::{Axis, Buffer, FeatureArray, Interval, Point5D, Region, RegionError};

use super::annotation::Annotation;
use super::features::FeatureExtractor;
use super::types::ClassifierError;

/// Keeps the inverse distance finite when a pixel sits on a centroid
const DISTANCE_EPSILON: f32 = 1e-6;

#[derive(Debug)]
pub struct PixelClassifier {
    feature_extractors: Vec<Arc<FeatureExtractor>>,
    classes: Vec<u8>,
    centroids: Vec<Vec<f32>>,
    num_features: usize,
}

impl PixelClassifier {
    /// Train from the labeled pixels of `annotations`
    pub fn train(
        feature_extractors: Vec<Arc<FeatureExtractor>>,
        annotations: &[Arc<Annotation>],
    ) -> Result<Self, ClassifierError> {
        if feature_extractors.is_empty() {
            return Err(ClassifierError::NoFeatureExtractors);
        }

        let mut classifier = Self {
            feature_extractors,
            classes: Vec::new(),
            centroids: Vec::new(),
            num_features: 0,
        };

        let mut sums: BTreeMap<u8, (Vec<f64>, u64)> = BTreeMap::new();
        let mut num_features: Option<usize> = None;

        for annotation in annotations {
            let scribblings = annotation.scribblings();
            let features = classifier.compute_features(annotation.data_source().as_ref(), scribblings.region())?;
            let count = features.shape()[Axis::C] as usize;
            match num_features {
                Some(expected) if expected != count => {
                    return Err(ClassifierError::FeatureMismatch {
                        expected,
                        actual: count,
                    });
                }
                _ => num_features = Some(count),
            }

            let region = scribblings.region();
            for z in region.get(Axis::Z).start()..region.get(Axis::Z).stop() {
                for y in region.get(Axis::Y).start()..region.get(Axis::Y).stop() {
                    for x in region.get(Axis::X).start()..region.get(Axis::X).stop() {
                        let point = Point5D::new(region.get(Axis::T).start(), 0, x, y, z);
                        let label = scribblings.get(&point).unwrap_or(0);
                        if label == 0 {
                            continue;
                        }
                        let (sum, n) = sums
                            .entry(label)
                            .or_insert_with(|| (vec![0.0; count], 0));
                        for (k, acc) in sum.iter_mut().enumerate() {
                            *acc += features.get(&point.with(Axis::C, k as i64)).unwrap_or(0.0) as f64;
                        }
                        *n += 1;
                    }
                }
            }
        }

        if sums.is_empty() {
            return Err(ClassifierError::NoLabels);
        }

        for (label, (sum, n)) in sums {
            debug!("Class {} trained from {} pixels", label, n);
            classifier.classes.push(label);
            classifier
                .centroids
                .push(sum.into_iter().map(|v| (v / n as f64) as f32).collect());
        }
        classifier.num_features = num_features.unwrap_or(0);

        info!(
            "Trained pixel classifier: {} classes, {} features",
            classifier.classes.len(),
            classifier.num_features
        );
        Ok(classifier)
    }

    /// Labels in output channel order
    pub fn classes(&self) -> &[u8] {
        &self.classes
    }

    pub fn feature_extractors(&self) -> &[Arc<FeatureExtractor>] {
        &self.feature_extractors
    }

    /// Number of prediction channels (one per class)
    pub fn num_channels(&self) -> u64 {
        self.classes.len() as u64
    }

    fn channel_interval(&self) -> Interval {
        // classes.len() always fits and 0 <= len
        Interval::new(0, self.classes.len() as i64).unwrap_or(Interval::single(0))
    }

    /// Region of the complete prediction for `source`
    pub fn expected_region(&self, source: &dyn DataSource) -> Region {
        source.full_region().with(Axis::C, self.channel_interval())
    }

    /// Zero-filled prediction buffer over the spatial extent of `roi`
    pub fn allocate_predictions(&self, roi: &Region) -> Result<Buffer, RegionError> {
        Buffer::allocate(&roi.with(Axis::C, self.channel_interval()), 0)
    }

    /// Features of every extractor stacked along the channel axis
    pub fn compute_features(&self, source: &dyn DataSource, roi: &Region) -> Result<FeatureArray, ClassifierError> {
        let parts = self
            .feature_extractors
            .iter()
            .map(|extractor| extractor.compute(source, roi))
            .collect::<Result<Vec<_>, _>>()?;

        let total: u64 = parts.iter().map(|p| p.shape()[Axis::C]).sum();
        let region = parts
            .first()
            .map(|p| *p.region())
            .ok_or(ClassifierError::NoFeatureExtractors)?
            .with(Axis::C, Interval::new(0, total as i64)?);

        let mut stacked = FeatureArray::allocate(&region, 0.0)?;
        let mut offset = 0i64;
        for part in parts {
            let channels = part.shape()[Axis::C] as i64;
            stacked.write_cropped(&part.translated(&Point5D::zero().with(Axis::C, offset)));
            offset += channels;
        }
        Ok(stacked)
    }

    /// Predict one tile; returns the prediction (channels = classes) and
    /// the features it was computed from, both covering `tile`
    pub fn predict_tile(
        &self,
        source: &dyn DataSource,
        tile: &Region,
    ) -> Result<(Buffer, FeatureArray), ClassifierError> {
        let features = self.compute_features(source, tile)?;
        let count = features.shape()[Axis::C] as usize;
        if count != self.num_features {
            return Err(ClassifierError::FeatureMismatch {
                expected: self.num_features,
                actual: count,
            });
        }

        let mut predictions = self.allocate_predictions(features.region())?;
        let plane = features.stride(Axis::C);
        let times = features.shape()[Axis::T] as usize;
        let (feature_t, prediction_t) = (features.stride(Axis::T), predictions.stride(Axis::T));
        let input = features.as_slice();
        let output = predictions.as_mut_slice();

        let mut vector = vec![0.0f32; count];
        let mut weights = vec![0.0f32; self.classes.len()];
        for t in 0..times {
            for j in 0..plane {
                for (k, value) in vector.iter_mut().enumerate() {
                    *value = input[t * feature_t + k * plane + j];
                }
                for (weight, centroid) in weights.iter_mut().zip(&self.centroids) {
                    let distance: f32 = vector
                        .iter()
                        .zip(centroid)
                        .map(|(v, m)| (v - m) * (v - m))
                        .sum();
                    *weight = 1.0 / (distance + DISTANCE_EPSILON);
                }
                let total: f32 = weights.iter().sum();
                for (class, weight) in weights.iter().enumerate() {
                    output[t * prediction_t + class * plane + j] = (weight / total * 255.0).round() as u8;
                }
            }
        }
        Ok((predictions, features))
    }
}
