//! In-memory object registry
//!
//! Objects live for the lifetime of the process unless explicitly removed.
//! Creation resolves id references in the payload, unflattens it and hands it
//! to the constructor selected by a [`Blueprint`].

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::{counter, gauge};
use tracing::{debug, info};
use uuid::Uuid;

use crate::classifier::{Annotation, AnnotationError, Color, FeatureExtractor, FeatureExtractorKind, PixelClassifier};
use crate::datasource::{ArrayDataSource, DataSource};
use crate::roi::{Axis, Point5D, RegionError, Shape};

use super::payload::{Payload, PayloadError, PayloadValue, RawPayload, RawValue};
use super::types::{ObjectKind, RegistryError, StoredObject};

/// Field naming the id of the object to create
const ID_FIELD: &str = "id";

/// Settings applied when a payload leaves them out
#[derive(Debug, Clone)]
pub struct RegistryDefaults {
    pub tile_shape: Shape,
}

impl Default for RegistryDefaults {
    fn default() -> Self {
        Self {
            tile_shape: Shape::spatial(256, 256, 1),
        }
    }
}

/// Constructor selector for [`ObjectRegistry::create`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blueprint {
    DataSource,
    Annotation,
    FeatureExtractor(FeatureExtractorKind),
    PixelClassifier,
}

impl Blueprint {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Blueprint::DataSource => ObjectKind::DataSource,
            Blueprint::Annotation => ObjectKind::Annotation,
            Blueprint::FeatureExtractor(_) => ObjectKind::FeatureExtractor,
            Blueprint::PixelClassifier => ObjectKind::PixelClassifier,
        }
    }

    fn build(&self, payload: &Payload, defaults: &RegistryDefaults) -> Result<StoredObject, RegistryError> {
        Ok(match self {
            Blueprint::DataSource => StoredObject::DataSource(build_data_source(payload, defaults)?),
            Blueprint::Annotation => StoredObject::Annotation(Arc::new(build_annotation(payload)?)),
            Blueprint::FeatureExtractor(kind) => {
                let sigma = payload.parse::<f32>("sigma")?;
                StoredObject::FeatureExtractor(Arc::new(FeatureExtractor::new(*kind, sigma)?))
            }
            Blueprint::PixelClassifier => StoredObject::PixelClassifier(Arc::new(build_classifier(payload)?)),
        })
    }
}

fn build_data_source(payload: &Payload, defaults: &RegistryDefaults) -> Result<Arc<dyn DataSource>, RegistryError> {
    let data = payload.bytes("data")?;
    let tile = defaults.tile_shape;
    let tile_defaults = [Axis::X, Axis::Y, Axis::Z].map(|axis| Some(tile[axis]));
    let tile_shape = match payload.components("tile_shape", ["x", "y", "z"], tile_defaults)? {
        Some([x, y, z]) => Shape::spatial(x, y, z),
        None => tile,
    };
    let source = match payload.components("shape", ["x", "y", "z", "c"], [None, None, Some(1), Some(1)])? {
        Some([x, y, z, c]) => ArrayDataSource::from_raw_bytes(data, Shape::new(1, c, x, y, z), tile_shape)?,
        None => ArrayDataSource::from_image_bytes(data, tile_shape)?,
    };
    Ok(Arc::new(source))
}

fn build_annotation(payload: &Payload) -> Result<Annotation, RegistryError> {
    let data_source = payload.object("raw_data")?.as_data_source("raw_data")?;
    let scribblings = payload.bytes("scribblings")?;
    let [x, y, z] = payload
        .components("offset", ["x", "y", "z"], [Some(0); 3])?
        .unwrap_or([0; 3]);
    Ok(Annotation::from_image_bytes(scribblings, Point5D::spatial(x, y, z), data_source)?)
}

fn build_classifier(payload: &Payload) -> Result<PixelClassifier, RegistryError> {
    let extractors = payload
        .objects("feature_extractors")?
        .into_iter()
        .enumerate()
        .map(|(i, object)| object.as_feature_extractor(&format!("feature_extractors.{}", i)))
        .collect::<Result<Vec<_>, _>>()?;
    let annotations = payload
        .objects("annotations")?
        .into_iter()
        .enumerate()
        .map(|(i, object)| object.as_annotation(&format!("annotations.{}", i)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PixelClassifier::train(extractors, &annotations)?)
}

/// Truncate a float coordinate toward zero; NaN, infinities and values
/// outside the `i64` range are rejected
fn coordinate(value: f64) -> Result<i64, AnnotationError> {
    // i64::MAX as f64 rounds up to 2^63, the first value that does not fit
    if !value.is_finite() || value.abs() >= i64::MAX as f64 {
        return Err(RegionError::CoordinateOutOfRange(value.to_string()).into());
    }
    Ok(value.trunc() as i64)
}

/// Build a line annotation from `color.0..2`, `pointA.0..2` and `pointB.0..2`.
///
/// Coordinates may be given as floats; they are truncated toward zero.
pub fn line_annotation(payload: &Payload, data_source: Arc<dyn DataSource>) -> Result<Annotation, RegistryError> {
    let [r, g, b] = payload
        .components::<f32, 3>("color", ["r", "g", "b"], [None; 3])?
        .ok_or_else(|| PayloadError::Missing("color".to_string()))?;
    let point = |field: &str| -> Result<Point5D, RegistryError> {
        let [x, y, z] = payload
            .components::<f64, 3>(field, ["x", "y", "z"], [None; 3])?
            .ok_or_else(|| PayloadError::Missing(field.to_string()))?;
        let [x, y, z] = [x, y, z].map(coordinate);
        Ok(Point5D::spatial(x?, y?, z?))
    };
    Ok(Annotation::from_line(Color::new(r, g, b)?, point("pointA")?, point("pointB")?, data_source)?)
}

/// Process-wide keyed store of immutable objects
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: DashMap<String, StoredObject>,
    defaults: RegistryDefaults,
}

impl ObjectRegistry {
    pub fn new(defaults: RegistryDefaults) -> Self {
        Self {
            objects: DashMap::new(),
            defaults,
        }
    }

    /// Replace every text value naming a stored object by that object, then
    /// unflatten. The `id` field is never resolved.
    pub fn resolve(&self, raw: RawPayload) -> Result<Payload, RegistryError> {
        let entries = raw
            .into_entries()
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    RawValue::Bytes(bytes) => PayloadValue::Bytes(bytes),
                    RawValue::Text(text) if key == ID_FIELD => PayloadValue::Text(text),
                    RawValue::Text(text) => match self.objects.get(&text) {
                        Some(object) => PayloadValue::Object(object.value().clone()),
                        None => PayloadValue::Text(text),
                    },
                };
                (key, value)
            })
            .collect();
        Ok(Payload::unflatten(entries)?)
    }

    /// Build an object from `raw` and store it under the payload's `id`, or a
    /// fresh UUID
    pub fn create(&self, blueprint: Blueprint, raw: RawPayload) -> Result<(StoredObject, String), RegistryError> {
        let payload = self.resolve(raw)?;
        let object = blueprint.build(&payload, &self.defaults)?;
        let id = payload
            .opt_text(ID_FIELD)?
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.insert(&id, object.clone())?;
        info!("Created {} {}", blueprint.kind(), id);
        Ok((object, id))
    }

    /// Store `object` under `id`; fails if the id is taken
    pub fn insert(&self, id: &str, object: StoredObject) -> Result<(), RegistryError> {
        let kind = object.kind();
        match self.objects.entry(id.to_string()) {
            Entry::Occupied(_) => {
                debug!("Rejected duplicate id {}", id);
                return Err(RegistryError::DuplicateId(id.to_string()));
            }
            Entry::Vacant(entry) => {
                entry.insert(object);
            }
        }
        // the shard lock is released here; len() locks every shard
        counter!("ndpredict_registry_created_total", "kind" => kind.name()).increment(1);
        gauge!("ndpredict_registry_objects").set(self.objects.len() as f64);
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<StoredObject, RegistryError> {
        self.objects
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn load_data_source(&self, id: &str) -> Result<Arc<dyn DataSource>, RegistryError> {
        self.load(id)?.as_data_source(id)
    }

    pub fn load_classifier(&self, id: &str) -> Result<Arc<PixelClassifier>, RegistryError> {
        self.load(id)?.as_classifier(id)
    }

    pub fn remove(&self, id: &str) -> Result<StoredObject, RegistryError> {
        let (_, object) = self
            .objects
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        gauge!("ndpredict_registry_objects").set(self.objects.len() as f64);
        info!("Removed {} {}", object.kind(), id);
        Ok(object)
    }

    /// Remove `id` only if it holds an object of `kind`
    pub fn remove_kind(&self, id: &str, kind: ObjectKind) -> Result<StoredObject, RegistryError> {
        match self.objects.remove_if(id, |_, object| object.kind() == kind) {
            Some((_, object)) => {
                gauge!("ndpredict_registry_objects").set(self.objects.len() as f64);
                info!("Removed {} {}", kind, id);
                Ok(object)
            }
            None => match self.objects.get(id) {
                Some(entry) => Err(RegistryError::WrongKind {
                    what: id.to_string(),
                    expected: kind,
                    actual: entry.value().kind(),
                }),
                None => Err(RegistryError::NotFound(id.to_string())),
            },
        }
    }

    pub fn list_by_kind(&self, kind: ObjectKind) -> HashMap<String, StoredObject> {
        self.objects
            .iter()
            .filter(|entry| entry.value().kind() == kind)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// The only registered data source
    pub fn sole_data_source(&self) -> Result<(String, Arc<dyn DataSource>), RegistryError> {
        let sources = self.list_by_kind(ObjectKind::DataSource);
        if sources.len() != 1 {
            return Err(RegistryError::AmbiguousSource { count: sources.len() });
        }
        let (id, object) = sources
            .into_iter()
            .next()
            .ok_or(RegistryError::AmbiguousSource { count: 0 })?;
        let source = object.as_data_source(&id)?;
        Ok((id, source))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::gradient_source;
    use image::{GrayImage, ImageEncoder, codecs::png::PngEncoder};

    fn gray_png(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Vec<u8> {
        let img = GrayImage::from_fn(width, height, |x, y| image::Luma([f(x, y)]));
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::L8)
            .unwrap();
        out
    }

    fn registry_with_source() -> (ObjectRegistry, String) {
        let registry = ObjectRegistry::default();
        let source: Arc<dyn DataSource> = Arc::new(gradient_source(16, 12, 1));
        registry.insert("ds", StoredObject::DataSource(source)).unwrap();
        (registry, "ds".to_string())
    }

    #[test]
    fn test_create_then_load() {
        let registry = ObjectRegistry::default();
        let raw = RawPayload::new().text("sigma", "1.5");
        let (object, id) = registry
            .create(Blueprint::FeatureExtractor(FeatureExtractorKind::GaussianSmoothing), raw)
            .unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        let loaded = registry.load(&id).unwrap();
        assert_eq!(loaded.kind(), ObjectKind::FeatureExtractor);
        let (a, b) = (
            object.as_feature_extractor(&id).unwrap(),
            loaded.as_feature_extractor(&id).unwrap(),
        );
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.sigma, 1.5);
    }

    #[test]
    fn test_remove_then_load_fails() {
        let (registry, id) = registry_with_source();
        registry.remove(&id).unwrap();
        assert!(matches!(registry.load(&id), Err(RegistryError::NotFound(_))));
        assert!(matches!(registry.remove(&id), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_explicit_id_and_duplicates() {
        let registry = ObjectRegistry::default();
        let raw = || RawPayload::new().text("sigma", "2").text("id", "smooth");
        let blueprint = Blueprint::FeatureExtractor(FeatureExtractorKind::GaussianSmoothing);
        let (_, id) = registry.create(blueprint, raw()).unwrap();
        assert_eq!(id, "smooth");
        assert!(matches!(
            registry.create(blueprint, raw()),
            Err(RegistryError::DuplicateId(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_wrong_kind() {
        let (registry, id) = registry_with_source();
        assert!(matches!(
            registry.load_classifier(&id),
            Err(RegistryError::WrongKind { expected: ObjectKind::PixelClassifier, actual: ObjectKind::DataSource, .. })
        ));
        assert!(matches!(
            registry.remove_kind(&id, ObjectKind::Annotation),
            Err(RegistryError::WrongKind { .. })
        ));
        assert!(registry.load(&id).is_ok());
    }

    #[test]
    fn test_create_raw_data_source() {
        let registry = ObjectRegistry::default();
        let raw = RawPayload::new()
            .bytes("data", vec![7u8; 4 * 3 * 2])
            .text("shape.x", "4")
            .text("shape.y", "3")
            .text("shape.c", "2")
            .text("tile_shape.x", "2");
        let (object, _) = registry.create(Blueprint::DataSource, raw).unwrap();
        let source = object.as_data_source("data").unwrap();
        assert_eq!(source.full_region().shape().unwrap(), Shape::new(1, 2, 4, 3, 1));
        assert_eq!(source.tile_shape(), Shape::spatial(2, 256, 1));
    }

    #[test]
    fn test_annotation_resolves_reference() {
        let (registry, id) = registry_with_source();
        let raw = RawPayload::new()
            .text("raw_data", id.clone())
            .bytes("scribblings", gray_png(4, 3, |x, _| x as u8))
            .text("offset.x", "10");
        let (object, _) = registry.create(Blueprint::Annotation, raw).unwrap();
        let annotation = object.as_annotation("annotation").unwrap();
        assert_eq!(annotation.scribblings().region().get(Axis::X).start(), 10);
        let stored = registry.load_data_source(&id).unwrap();
        assert!(std::ptr::addr_eq(Arc::as_ptr(annotation.data_source()), Arc::as_ptr(&stored)));
    }

    #[test]
    fn test_unresolved_reference() {
        let registry = ObjectRegistry::default();
        let raw = RawPayload::new()
            .text("raw_data", "missing")
            .bytes("scribblings", gray_png(2, 2, |_, _| 1));
        assert!(matches!(
            registry.create(Blueprint::Annotation, raw),
            Err(RegistryError::Payload(PayloadError::UnresolvedReference { .. }))
        ));
    }

    #[test]
    fn test_classifier_from_references() {
        let (registry, id) = registry_with_source();
        let (_, extractor) = registry
            .create(
                Blueprint::FeatureExtractor(FeatureExtractorKind::GaussianSmoothing),
                RawPayload::new().text("sigma", "1"),
            )
            .unwrap();
        let (_, annotation) = registry
            .create(
                Blueprint::Annotation,
                RawPayload::new()
                    .text("raw_data", id)
                    .bytes("scribblings", gray_png(16, 12, |x, _| match x {
                        1 => 1,
                        14 => 2,
                        _ => 0,
                    })),
            )
            .unwrap();
        let raw = RawPayload::new()
            .text("feature_extractors.0", extractor)
            .text("annotations.0", annotation)
            .text("id", "clf");
        registry.create(Blueprint::PixelClassifier, raw).unwrap();
        let classifier = registry.load_classifier("clf").unwrap();
        assert_eq!(classifier.classes(), &[1, 2]);
    }

    #[test]
    fn test_list_by_kind_and_sole_source() {
        let (registry, id) = registry_with_source();
        registry
            .create(
                Blueprint::FeatureExtractor(FeatureExtractorKind::HessianOfGaussian),
                RawPayload::new().text("sigma", "1"),
            )
            .unwrap();
        assert_eq!(registry.list_by_kind(ObjectKind::FeatureExtractor).len(), 1);
        assert_eq!(registry.sole_data_source().unwrap().0, id);

        let other: Arc<dyn DataSource> = Arc::new(gradient_source(4, 4, 1));
        registry.insert("ds2", StoredObject::DataSource(other)).unwrap();
        assert!(matches!(
            registry.sole_data_source(),
            Err(RegistryError::AmbiguousSource { count: 2 })
        ));
    }

    #[test]
    fn test_concurrent_creates_with_same_id() {
        let registry = ObjectRegistry::default();
        let results: Vec<_> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        registry.create(
                            Blueprint::FeatureExtractor(FeatureExtractorKind::GaussianSmoothing),
                            RawPayload::new().text("sigma", "1").text("id", "shared"),
                        )
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, RegistryError::DuplicateId(id) if id == "shared"))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_interleaved_remove_and_load() {
        let registry = ObjectRegistry::default();
        let extractor = || {
            StoredObject::FeatureExtractor(Arc::new(
                FeatureExtractor::new(FeatureExtractorKind::GaussianSmoothing, 1.0).unwrap(),
            ))
        };
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let registry = &registry;
                scope.spawn(move || {
                    for round in 0..200 {
                        let id = format!("obj-{}", round % 5);
                        match (worker + round) % 3 {
                            0 => match registry.insert(&id, extractor()) {
                                Ok(()) | Err(RegistryError::DuplicateId(_)) => {}
                                Err(e) => panic!("unexpected insert error: {e}"),
                            },
                            1 => match registry.remove(&id) {
                                Ok(_) | Err(RegistryError::NotFound(_)) => {}
                                Err(e) => panic!("unexpected remove error: {e}"),
                            },
                            _ => match registry.load(&id) {
                                Ok(object) => assert_eq!(object.kind(), ObjectKind::FeatureExtractor),
                                Err(RegistryError::NotFound(_)) => {}
                                Err(e) => panic!("unexpected load error: {e}"),
                            },
                        }
                    }
                });
            }
        });
        assert!(registry.len() <= 5);
    }

    #[test]
    fn test_line_annotation_payload() {
        let (registry, id) = registry_with_source();
        let payload = registry
            .resolve(
                RawPayload::new()
                    .text("color.0", "1")
                    .text("color.1", "0")
                    .text("color.2", "0")
                    .text("pointA.0", "1.9")
                    .text("pointA.1", "2")
                    .text("pointA.2", "0")
                    .text("pointB.0", "5")
                    .text("pointB.1", "4")
                    .text("pointB.2", "0"),
            )
            .unwrap();
        let annotation = line_annotation(&payload, registry.load_data_source(&id).unwrap()).unwrap();
        let region = annotation.scribblings().region();
        assert_eq!(region.get(Axis::X).start(), 1);
        assert_eq!(region.get(Axis::X).stop(), 6);
        assert_eq!(region.get(Axis::Y).stop(), 5);
    }

    #[test]
    fn test_line_annotation_rejects_unrepresentable_coordinates() {
        let (registry, id) = registry_with_source();
        for bad in ["1e30", "-1e30", "inf", "NaN"] {
            let payload = registry
                .resolve(
                    RawPayload::new()
                        .text("color.0", "1")
                        .text("color.1", "0")
                        .text("color.2", "0")
                        .text("pointA.0", bad)
                        .text("pointA.1", "0")
                        .text("pointA.2", "0")
                        .text("pointB.0", "1")
                        .text("pointB.1", "1")
                        .text("pointB.2", "0"),
                )
                .unwrap();
            let result = line_annotation(&payload, registry.load_data_source(&id).unwrap());
            assert!(
                matches!(
                    result,
                    Err(RegistryError::Annotation(AnnotationError::Region(
                        RegionError::CoordinateOutOfRange(_)
                    )))
                ),
                "{bad} was accepted"
            );
        }
    }
}
