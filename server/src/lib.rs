//! ndpredict Server Library
//!
//! Volumetric pixel classification over HTTP. This module exports the server
//! components for use in the binary, integration tests and benches.

pub mod api;
pub mod classifier;
pub mod config;
pub mod datasource;
pub mod encoding;
pub mod prediction;
pub mod registry;
pub mod roi;

mod test_utils;

// Re-export commonly used types
pub use api::{AppState, api_routes};
pub use config::Config;
pub use registry::ObjectRegistry;
