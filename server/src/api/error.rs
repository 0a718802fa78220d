//! Error responses of the HTTP API
//!
//! Every failure reaching a client is a JSON `{kind, message}` body whose
//! `kind` selects the status code.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::classifier::AnnotationError;
use crate::encoding::EncodingError;
use crate::prediction::PredictionError;
use crate::registry::{PayloadError, RegistryError};
use crate::roi::RegionError;

/// Error response for the API
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub kind: String,
    pub message: String,
}

impl ApiErrorResponse {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::new("invalid_payload", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.kind.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "wrong_kind" | "invalid_region" | "invalid_payload" => StatusCode::BAD_REQUEST,
            "duplicate_id" | "ambiguous_source" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn registry_kind(e: &RegistryError) -> &'static str {
    match e {
        RegistryError::NotFound(_) | RegistryError::UnknownKind(_) => "not_found",
        RegistryError::DuplicateId(_) => "duplicate_id",
        RegistryError::WrongKind { .. } => "wrong_kind",
        RegistryError::AmbiguousSource { .. } => "ambiguous_source",
        RegistryError::Payload(PayloadError::UnresolvedReference { .. }) => "not_found",
        RegistryError::Annotation(
            AnnotationError::OutOfBounds { .. } | AnnotationError::NotSingleChannel(_) | AnnotationError::Region(_),
        ) => "invalid_region",
        RegistryError::Payload(_)
        | RegistryError::DataSource(_)
        | RegistryError::Annotation(_)
        | RegistryError::Feature(_)
        | RegistryError::Classifier(_) => "invalid_payload",
    }
}

impl From<RegistryError> for ApiErrorResponse {
    fn from(e: RegistryError) -> Self {
        Self::new(registry_kind(&e), e.to_string())
    }
}

impl From<PayloadError> for ApiErrorResponse {
    fn from(e: PayloadError) -> Self {
        RegistryError::from(e).into()
    }
}

impl From<RegionError> for ApiErrorResponse {
    fn from(e: RegionError) -> Self {
        Self::new("invalid_region", e.to_string())
    }
}

impl From<PredictionError> for ApiErrorResponse {
    fn from(e: PredictionError) -> Self {
        let kind = match &e {
            PredictionError::Registry(inner) => registry_kind(inner),
            PredictionError::InvalidRegion(_) => "invalid_region",
            PredictionError::TileComputation { .. } => "tile_computation_failure",
            PredictionError::TileOverlap { .. } => "tile_overlap",
            PredictionError::DataSource(_) | PredictionError::Internal(_) => "internal",
        };
        Self::new(kind, e.to_string())
    }
}

impl From<EncodingError> for ApiErrorResponse {
    fn from(e: EncodingError) -> Self {
        let kind = match &e {
            EncodingError::Image(_) => "internal",
            _ => "invalid_region",
        };
        Self::new(kind, e.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiErrorResponse {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::internal(format!("Worker task failed: {}", e))
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}: {}", self.kind, self.message);
        } else {
            tracing::debug!("{}: {}", self.kind, self.message);
        }
        (status, Json(self)).into_response()
    }
}
