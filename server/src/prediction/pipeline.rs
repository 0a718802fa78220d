//! Tiled, parallel prediction
//!
//! A request is clamped to the data source, split along the source's tile
//! grid and computed on a shared rayon pool. Each finished tile is cropped
//! into the output buffer; the first failing tile fails the whole request.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use metrics::{counter, histogram};
use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::classifier::PixelClassifier;
use crate::datasource::DataSource;
use crate::registry::ObjectRegistry;
use crate::roi::{Axis, Buffer, Interval, Region};

use super::types::PredictionError;

/// Build the process-wide tile worker pool
pub fn build_pool(threads: usize) -> Result<ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("ndpredict-tile-{}", i))
        .build()
}

/// Ignore channels: tiles span input channels, predictions span classes
fn without_channels(region: &Region) -> Region {
    region.with(Axis::C, Interval::single(0))
}

/// Fail unless `tiles` cover `effective` exactly once
pub fn check_coverage(tiles: &[Region], effective: &Region) -> Result<(), PredictionError> {
    let target = without_channels(effective);
    let expected = target.volume()?;
    let mut covered = 0u64;
    for tile in tiles {
        if let Some(overlap) = without_channels(tile).intersection(&target) {
            covered += overlap.volume()?;
        }
    }
    if covered != expected {
        return Err(PredictionError::TileOverlap { expected, covered });
    }
    Ok(())
}

/// Runs predictions for registered classifiers and data sources
#[derive(Clone)]
pub struct PredictionService {
    registry: Arc<ObjectRegistry>,
    pool: Arc<ThreadPool>,
}

impl PredictionService {
    pub fn new(registry: Arc<ObjectRegistry>, pool: Arc<ThreadPool>) -> Self {
        Self { registry, pool }
    }

    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    /// Predict `roi` with registered objects; blocks until every tile is done
    pub fn predict(
        &self,
        roi: &Region,
        classifier_id: &str,
        data_source_id: &str,
    ) -> Result<Buffer, PredictionError> {
        let classifier = self.registry.load_classifier(classifier_id)?;
        let source = self.registry.load_data_source(data_source_id)?;
        self.predict_with(&classifier, source.as_ref(), roi)
    }

    /// Predict `roi` clamped to `source`; the channel axis of the result
    /// spans the classifier's classes
    pub fn predict_with(
        &self,
        classifier: &PixelClassifier,
        source: &dyn DataSource,
        roi: &Region,
    ) -> Result<Buffer, PredictionError> {
        let start = Instant::now();
        counter!("ndpredict_predictions_total").increment(1);

        let result = self.run(classifier, source, roi);

        histogram!("ndpredict_prediction_duration_seconds").record(start.elapsed());
        if let Err(e) = &result {
            counter!("ndpredict_prediction_errors_total").increment(1);
            warn!("Prediction over {} failed: {}", roi, e);
        }
        result
    }

    fn run(
        &self,
        classifier: &PixelClassifier,
        source: &dyn DataSource,
        roi: &Region,
    ) -> Result<Buffer, PredictionError> {
        let expected = classifier.expected_region(source);
        let effective = roi.clamp(&expected).with(Axis::C, expected.get(Axis::C));
        let output = classifier.allocate_predictions(&effective)?;
        if effective.is_empty() {
            return Ok(output);
        }

        let tiles: Vec<Region> = source
            .tiles()?
            .filter(|tile| without_channels(tile).intersects(&without_channels(&effective)))
            .collect();
        check_coverage(&tiles, &effective)?;
        debug!(
            "Predicting {} with {} tile(s) on {} worker(s)",
            effective,
            tiles.len(),
            self.pool.current_num_threads()
        );

        let output = Mutex::new(output);
        self.pool.install(|| {
            tiles.par_iter().try_for_each(|tile| {
                let tile_start = Instant::now();
                let work = tile.clamp(&effective.with(Axis::C, tile.get(Axis::C)));
                let (prediction, _) = classifier.predict_tile(source, &work).map_err(|e| {
                    counter!("ndpredict_tile_errors_total").increment(1);
                    PredictionError::TileComputation { tile: *tile, source: e }
                })?;
                histogram!("ndpredict_tile_duration_seconds").record(tile_start.elapsed());
                counter!("ndpredict_tiles_computed_total").increment(1);

                output
                    .lock()
                    .map_err(|_| PredictionError::Internal("output buffer lock poisoned".to_string()))?
                    .write_cropped(&prediction);
                Ok::<(), PredictionError>(())
            })
        })?;

        output
            .into_inner()
            .map_err(|_| PredictionError::Internal("output buffer lock poisoned".to_string()))
    }
}
