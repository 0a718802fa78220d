//! HTTP route handlers
//!
//! Create endpoints take multipart forms: text fields become payload text
//! (and are resolved against registered ids), file fields become bytes.
//! CPU-bound work (decoding, training, prediction) runs on blocking threads.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classifier::FeatureExtractorKind;
use crate::encoding::{ChunkCacheKey, ChunkKey, VolumeInfo, encode_preview, encode_raw_chunk};
use crate::registry::{
    Blueprint, ObjectDescriptor, ObjectKind, RawPayload, RegistryError, StoredObject, line_annotation,
};
use crate::roi::{Axis, Interval, Region};

use super::error::ApiErrorResponse;
use super::state::AppState;

/// Collect a multipart form into a flat payload
async fn read_payload(mut multipart: Multipart) -> Result<RawPayload, ApiErrorResponse> {
    let mut payload = RawPayload::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiErrorResponse::invalid_payload(e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        if field.file_name().is_some() {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiErrorResponse::invalid_payload(e.body_text()))?;
            payload.push_bytes(name, bytes);
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ApiErrorResponse::invalid_payload(e.body_text()))?;
            payload.push_text(name, text);
        }
    }
    debug!("Received payload with {} field(s)", payload.field_count());
    Ok(payload)
}

/// Build and register an object off the async runtime
async fn create(state: &AppState, blueprint: Blueprint, raw: RawPayload) -> Result<Json<String>, ApiErrorResponse> {
    let registry = state.registry.clone();
    let (_, id) = tokio::task::spawn_blocking(move || registry.create(blueprint, raw)).await??;
    Ok(Json(id))
}

fn describe_all(state: &AppState, kind: ObjectKind) -> Json<HashMap<String, ObjectDescriptor>> {
    Json(
        state
            .registry
            .list_by_kind(kind)
            .iter()
            .map(|(id, object)| (id.clone(), ObjectDescriptor::from(object)))
            .collect(),
    )
}

/// POST /data_sources - Register an image or raw volume
pub async fn create_data_source(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<String>, ApiErrorResponse> {
    let raw = read_payload(multipart).await?;
    create(&state, Blueprint::DataSource, raw).await
}

/// GET /data_sources - Describe every data source
pub async fn list_data_sources(State(state): State<AppState>) -> Json<HashMap<String, ObjectDescriptor>> {
    describe_all(&state, ObjectKind::DataSource)
}

/// POST /annotations - Register scribblings for a data source
pub async fn create_annotation(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<String>, ApiErrorResponse> {
    let raw = read_payload(multipart).await?;
    create(&state, Blueprint::Annotation, raw).await
}

/// POST /feature_extractors/:kind - Register a feature extractor
pub async fn create_feature_extractor(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    multipart: Multipart,
) -> Result<Json<String>, ApiErrorResponse> {
    let kind: FeatureExtractorKind = kind.parse().map_err(|_| RegistryError::UnknownKind(kind.clone()))?;
    let raw = read_payload(multipart).await?;
    create(&state, Blueprint::FeatureExtractor(kind), raw).await
}

/// GET /feature_extractors - Describe every feature extractor
pub async fn list_feature_extractors(State(state): State<AppState>) -> Json<HashMap<String, ObjectDescriptor>> {
    describe_all(&state, ObjectKind::FeatureExtractor)
}

/// POST /pixel_classifier - Train and register a classifier
pub async fn create_pixel_classifier(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<String>, ApiErrorResponse> {
    let raw = read_payload(multipart).await?;
    create(&state, Blueprint::PixelClassifier, raw).await
}

#[derive(Debug, Serialize)]
pub struct IdResponse {
    pub id: String,
}

/// POST /lines - Register a line scribbling between two points
pub async fn create_line(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<IdResponse>, ApiErrorResponse> {
    let raw = read_payload(multipart).await?;
    let registry = state.registry.clone();
    let id = tokio::task::spawn_blocking(move || -> Result<String, RegistryError> {
        let payload = registry.resolve(raw)?;

        let data_source = if payload.contains("data_source_id") {
            payload
                .object("data_source_id")?
                .as_data_source("data_source_id")?
        } else {
            warn!("POST /lines without data_source_id; falling back to the only registered data source");
            registry.sole_data_source()?.1
        };

        let annotation = line_annotation(&payload, data_source)?;
        let id = payload
            .opt_text("id")?
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        registry.insert(&id, StoredObject::Annotation(annotation.into()))?;
        Ok(id)
    })
    .await??;
    info!("Created line annotation {}", id);
    Ok(Json(IdResponse { id }))
}

/// DELETE /lines/:id - Remove an annotation
pub async fn delete_line(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<IdResponse>, ApiErrorResponse> {
    state.registry.remove_kind(&id, ObjectKind::Annotation)?;
    Ok(Json(IdResponse { id }))
}

/// Region from `?x=0_50&y=0_50&z=2_3`; axes left out are unbounded
fn region_from_query(query: &HashMap<String, String>) -> Result<Region, ApiErrorResponse> {
    let mut region = Region::all();
    for axis in Axis::ALL {
        if let Some(value) = query.get(&axis.to_string()) {
            region = region.with(axis, Interval::parse(value, '_')?);
        }
    }
    Ok(region)
}

fn required<'a>(query: &'a HashMap<String, String>, key: &str) -> Result<&'a str, ApiErrorResponse> {
    query
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| ApiErrorResponse::invalid_payload(format!("Missing query parameter '{}'", key)))
}

/// GET /pixel_predictions/ - One prediction channel of a plane as PNG
pub async fn get_pixel_predictions(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiErrorResponse> {
    let roi = region_from_query(&query)?;
    let classifier_id = required(&query, "pixel_classifier_id")?.to_string();
    let data_source_id = required(&query, "data_source_id")?.to_string();
    let channel = match query.get("channel") {
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| ApiErrorResponse::new("invalid_region", format!("Invalid channel '{}'", value)))?,
        None => 0,
    };

    let predictions = state.predictions.clone();
    let png = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ApiErrorResponse> {
        let buffer = predictions.predict(&roi, &classifier_id, &data_source_id)?;
        Ok(encode_preview(&buffer, channel)?)
    })
    .await??;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// GET /predictions/:classifier/:data_source/data/:chunk - Raw chunk
pub async fn get_raw_chunk(
    State(state): State<AppState>,
    Path((classifier_id, data_source_id, chunk)): Path<(String, String, String)>,
) -> Result<Response, ApiErrorResponse> {
    let chunk: ChunkKey = chunk.parse()?;
    let key = ChunkCacheKey {
        classifier_id: classifier_id.clone(),
        data_source_id: data_source_id.clone(),
        chunk,
    };

    let predictions = state.predictions.clone();
    let body = state
        .chunk_cache
        .get_or_try_insert_with(key, || async move {
            let encoded = tokio::task::spawn_blocking(move || -> Result<Bytes, ApiErrorResponse> {
                let buffer = predictions.predict(&chunk.region(), &classifier_id, &data_source_id)?;
                Ok(encode_raw_chunk(&buffer)?)
            })
            .await??;
            Ok::<_, ApiErrorResponse>(encoded)
        })
        .await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        body,
    )
        .into_response())
}

/// GET /predictions/:classifier/:data_source/info - Volume metadata
pub async fn get_volume_info(
    State(state): State<AppState>,
    Path((classifier_id, data_source_id)): Path<(String, String)>,
) -> Result<Json<VolumeInfo>, ApiErrorResponse> {
    let classifier = state.registry.load_classifier(&classifier_id)?;
    let source = state.registry.load_data_source(&data_source_id)?;
    let size = state.chunk_size;
    let info = VolumeInfo::for_region(&classifier.expected_region(source.as_ref()), [size, size, size])?;
    Ok(Json(info))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub objects: usize,
}

/// GET /health - Liveness and registry size
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        objects: state.registry.len(),
    })
}

/// Create the API router
pub fn api_routes(state: AppState) -> Router {
    let body_limit = state.max_upload_size;
    Router::new()
        .route("/health", get(health))
        .route("/data_sources", post(create_data_source).get(list_data_sources))
        .route("/annotations", post(create_annotation))
        .route("/feature_extractors", get(list_feature_extractors))
        .route("/feature_extractors/:kind", post(create_feature_extractor))
        .route("/pixel_classifier", post(create_pixel_classifier))
        .route("/lines", post(create_line))
        .route("/lines/:id", delete(delete_line))
        .route("/pixel_predictions", get(get_pixel_predictions))
        .route("/pixel_predictions/", get(get_pixel_predictions))
        .route(
            "/predictions/:classifier_id/:data_source_id/data/:chunk",
            get(get_raw_chunk),
        )
        .route(
            "/predictions/:classifier_id/:data_source_id/info",
            get(get_volume_info),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_from_query() {
        let query: HashMap<String, String> = [("x", "0_50"), ("z", "2_3"), ("channel", "1")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let region = region_from_query(&query).unwrap();
        assert_eq!(region.get(Axis::X), Interval::new(0, 50).unwrap());
        assert_eq!(region.get(Axis::Z), Interval::new(2, 3).unwrap());
        assert!(!region.get(Axis::Y).is_bounded());
    }

    #[test]
    fn test_region_from_query_rejects_inverted() {
        let query: HashMap<String, String> = [("y".to_string(), "9_3".to_string())].into_iter().collect();
        let error = region_from_query(&query).unwrap_err();
        assert_eq!(error.kind, "invalid_region");
    }
}
