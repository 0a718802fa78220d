//! Registry-related types and error definitions

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::classifier::{
    Annotation, AnnotationError, ClassifierError, FeatureError, FeatureExtractor, PixelClassifier,
};
use crate::datasource::{DataSource, DataSourceDescriptor, DataSourceError};

use super::payload::PayloadError;

/// Errors that can occur when creating or looking up objects
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Id already in use: {0}")]
    DuplicateId(String),

    #[error("{what} is a {actual}, expected a {expected}")]
    WrongKind {
        what: String,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    #[error("Expected exactly one data source, found {count}")]
    AmbiguousSource { count: usize },

    #[error("Unknown feature extractor kind: {0}")]
    UnknownKind(String),

    #[error(transparent)]
    Payload(#[from] PayloadError),

    #[error(transparent)]
    DataSource(#[from] DataSourceError),

    #[error(transparent)]
    Annotation(#[from] AnnotationError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// Kinds of stored objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    DataSource,
    Annotation,
    FeatureExtractor,
    PixelClassifier,
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::DataSource => "data_source",
            ObjectKind::Annotation => "annotation",
            ObjectKind::FeatureExtractor => "feature_extractor",
            ObjectKind::PixelClassifier => "pixel_classifier",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A registry entry; every variant is immutable once stored
#[derive(Debug, Clone)]
pub enum StoredObject {
    DataSource(Arc<dyn DataSource>),
    Annotation(Arc<Annotation>),
    FeatureExtractor(Arc<FeatureExtractor>),
    PixelClassifier(Arc<PixelClassifier>),
}

impl StoredObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            StoredObject::DataSource(_) => ObjectKind::DataSource,
            StoredObject::Annotation(_) => ObjectKind::Annotation,
            StoredObject::FeatureExtractor(_) => ObjectKind::FeatureExtractor,
            StoredObject::PixelClassifier(_) => ObjectKind::PixelClassifier,
        }
    }

    fn wrong_kind(&self, what: &str, expected: ObjectKind) -> RegistryError {
        RegistryError::WrongKind {
            what: what.to_string(),
            expected,
            actual: self.kind(),
        }
    }

    /// `what` names the object in the error (its id or payload field)
    pub fn as_data_source(&self, what: &str) -> Result<Arc<dyn DataSource>, RegistryError> {
        match self {
            StoredObject::DataSource(source) => Ok(source.clone()),
            other => Err(other.wrong_kind(what, ObjectKind::DataSource)),
        }
    }

    pub fn as_annotation(&self, what: &str) -> Result<Arc<Annotation>, RegistryError> {
        match self {
            StoredObject::Annotation(annotation) => Ok(annotation.clone()),
            other => Err(other.wrong_kind(what, ObjectKind::Annotation)),
        }
    }

    pub fn as_feature_extractor(&self, what: &str) -> Result<Arc<FeatureExtractor>, RegistryError> {
        match self {
            StoredObject::FeatureExtractor(extractor) => Ok(extractor.clone()),
            other => Err(other.wrong_kind(what, ObjectKind::FeatureExtractor)),
        }
    }

    pub fn as_classifier(&self, what: &str) -> Result<Arc<PixelClassifier>, RegistryError> {
        match self {
            StoredObject::PixelClassifier(classifier) => Ok(classifier.clone()),
            other => Err(other.wrong_kind(what, ObjectKind::PixelClassifier)),
        }
    }
}

/// Listing entry for stored objects
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ObjectDescriptor {
    DataSource(DataSourceDescriptor),
    FeatureExtractor(FeatureExtractor),
    Annotation { region: String, labels: Vec<u8> },
    PixelClassifier {
        classes: Vec<u8>,
        num_feature_extractors: usize,
    },
}

impl From<&StoredObject> for ObjectDescriptor {
    fn from(object: &StoredObject) -> Self {
        match object {
            StoredObject::DataSource(source) => ObjectDescriptor::DataSource(source.descriptor()),
            StoredObject::FeatureExtractor(extractor) => {
                ObjectDescriptor::FeatureExtractor(extractor.as_ref().clone())
            }
            StoredObject::Annotation(annotation) => ObjectDescriptor::Annotation {
                region: annotation.scribblings().region().to_string(),
                labels: annotation.labels().into_iter().collect(),
            },
            StoredObject::PixelClassifier(classifier) => ObjectDescriptor::PixelClassifier {
                classes: classifier.classes().to_vec(),
                num_feature_extractors: classifier.feature_extractors().len(),
            },
        }
    }
}
