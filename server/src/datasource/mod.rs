//! Data source module for addressable sample volumes
//!
//! This module provides:
//! - `DataSource` trait for abstracting sample volumes and their tiling grid
//! - `ArrayDataSource` holding decoded image or raw samples in memory

mod memory;
mod service;
mod types;

pub use memory::{ArrayDataSource, RAW_SAMPLE_ORDER};
pub use service::DataSource;
pub use types::{DataSourceDescriptor, DataSourceError};
