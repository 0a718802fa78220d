//! Volume metadata for the raw chunk protocol

use serde::{Deserialize, Serialize};

use crate::roi::{Axis, Region, RegionError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleInfo {
    pub key: String,
    pub size: [u64; 3],
    pub resolution: [u64; 3],
    pub chunk_sizes: Vec<[u64; 3]>,
    pub encoding: String,
}

/// `info` document of a single-scale `uint8` image volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeInfo {
    #[serde(rename = "@type")]
    pub info_type: String,
    #[serde(rename = "type")]
    pub volume_type: String,
    pub data_type: String,
    pub num_channels: u64,
    pub scales: Vec<ScaleInfo>,
}

impl VolumeInfo {
    /// Describe the full prediction `region`, served in `chunk_size` chunks
    pub fn for_region(region: &Region, chunk_size: [u64; 3]) -> Result<Self, RegionError> {
        let shape = region.shape()?;
        Ok(Self {
            info_type: "neuroglancer_multiscale_volume".to_string(),
            volume_type: "image".to_string(),
            data_type: "uint8".to_string(),
            num_channels: shape[Axis::C],
            scales: vec![ScaleInfo {
                key: "data".to_string(),
                size: [shape[Axis::X], shape[Axis::Y], shape[Axis::Z]],
                resolution: [1, 1, 1],
                chunk_sizes: vec![chunk_size],
                encoding: "raw".to_string(),
            }],
        })
    }
}
