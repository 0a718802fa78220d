//! HTTP API module
//!
//! This module provides:
//! - `AppState` shared by every handler
//! - `ApiErrorResponse`, the `{kind, message}` error body
//! - `api_routes` wiring registry, prediction and encoding endpoints

mod error;
pub mod routes;
mod state;

pub use error::ApiErrorResponse;
pub use routes::api_routes;
pub use state::AppState;
