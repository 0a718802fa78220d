//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use image::{GrayImage, ImageFormat, RgbImage};
use ndpredict_server::encoding::ChunkCache;
use ndpredict_server::prediction::build_pool;
use ndpredict_server::{AppState, ObjectRegistry, api_routes};
use std::io::Cursor;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const BOUNDARY: &str = "ndpredict-test-boundary";

/// Create a test application router with state
pub fn create_test_app_with_state() -> (Router, AppState) {
    let pool = build_pool(2).expect("test pool");
    let state = AppState::new(
        Arc::new(ObjectRegistry::default()),
        Arc::new(pool),
        Arc::new(ChunkCache::default()),
    );
    (api_routes(state.clone()), state)
}

/// Create a test application router with all routes configured
pub fn create_test_app() -> Router {
    create_test_app_with_state().0
}

/// Builder for `multipart/form-data` request bodies
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl AsRef<str>) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{}\r\n",
                value.as_ref()
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.bin\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

/// Encode a grayscale PNG of `width` x `height` from a pixel function
pub fn gray_png(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Vec<u8> {
    let image = GrayImage::from_fn(width, height, |x, y| image::Luma([f(x, y)]));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .expect("png encoding");
    out.into_inner()
}

/// Encode an RGB PNG of `width` x `height` from a pixel function
pub fn rgb_png(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| image::Rgb(f(x, y)));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .expect("png encoding");
    out.into_inner()
}

/// Raw `uint8` volume in x-fastest order: dark left half, bright right half
pub fn two_phase_volume(width: usize, height: usize, depth: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * depth);
    for _z in 0..depth {
        for _y in 0..height {
            for x in 0..width {
                data.push(if x < width / 2 { 20 } else { 220 });
            }
        }
    }
    data
}

/// Send a request and return status plus the collected body
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn delete(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    send(
        app,
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn post_form(app: &Router, uri: &str, form: MultipartBody) -> (StatusCode, Vec<u8>) {
    send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(form.finish()))
            .unwrap(),
    )
    .await
}

/// POST a form that must succeed and return the created id
pub async fn create(app: &Router, uri: &str, form: MultipartBody) -> String {
    let (status, body) = post_form(app, uri, form).await;
    assert_eq!(
        status,
        StatusCode::OK,
        "POST {uri} failed: {}",
        String::from_utf8_lossy(&body)
    );
    serde_json::from_slice(&body).unwrap()
}

pub fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

/// Ids of a trained two-phase setup on a 100x100x10 raw volume
pub struct TrainedVolume {
    pub data_source: String,
    pub extractors: [String; 2],
    pub annotation: String,
    pub classifier: String,
}

pub async fn train_two_phase_volume(app: &Router) -> TrainedVolume {
    let data_source = create(
        app,
        "/data_sources",
        MultipartBody::new()
            .file("data", &two_phase_volume(100, 100, 10))
            .text("shape.x", "100")
            .text("shape.y", "100")
            .text("shape.z", "10")
            .text("tile_shape.x", "50")
            .text("tile_shape.y", "50")
            .text("tile_shape.z", "5"),
    )
    .await;

    let smoothing = create(
        app,
        "/feature_extractors/GaussianSmoothing",
        MultipartBody::new().text("sigma", "0.7"),
    )
    .await;
    let hessian = create(
        app,
        "/feature_extractors/HessianOfGaussian",
        MultipartBody::new().text("sigma", "1.0"),
    )
    .await;

    let scribblings = gray_png(100, 100, |x, _| match x {
        5 => 1,
        94 => 2,
        _ => 0,
    });
    let annotation = create(
        app,
        "/annotations",
        MultipartBody::new()
            .text("raw_data", &data_source)
            .file("scribblings", &scribblings),
    )
    .await;

    let classifier = create(
        app,
        "/pixel_classifier",
        MultipartBody::new()
            .text("feature_extractors.0", &smoothing)
            .text("feature_extractors.1", &hessian)
            .text("annotations.0", &annotation),
    )
    .await;

    TrainedVolume {
        data_source,
        extractors: [smoothing, hessian],
        annotation,
        classifier,
    }
}
