//! In-plane feature extractors
//!
//! Both extractors filter every channel separately in the x/y plane with
//! clamp-to-edge boundaries at the data source border. A tile is always read
//! with a halo of `ceil(3 * sigma)` pixels so that the features of a pixel do
//! not depend on which tile it was computed in.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::datasource::DataSource;
use crate::roi::{Axis, FeatureArray, Interval, Point5D, Region};

use super::types::FeatureError;

/// Closed set of feature extractor kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureExtractorKind {
    GaussianSmoothing,
    HessianOfGaussian,
}

impl FeatureExtractorKind {
    pub const ALL: [FeatureExtractorKind; 2] = [
        FeatureExtractorKind::GaussianSmoothing,
        FeatureExtractorKind::HessianOfGaussian,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FeatureExtractorKind::GaussianSmoothing => "gaussian_smoothing",
            FeatureExtractorKind::HessianOfGaussian => "hessian_of_gaussian",
        }
    }

    /// Output channels produced per input channel
    fn channel_multiplier(&self) -> u64 {
        match self {
            FeatureExtractorKind::GaussianSmoothing => 1,
            FeatureExtractorKind::HessianOfGaussian => 2,
        }
    }
}

impl fmt::Display for FeatureExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepts `gaussian_smoothing` as well as `GaussianSmoothing`
impl FromStr for FeatureExtractorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        FeatureExtractorKind::ALL
            .into_iter()
            .find(|kind| kind.name().replace('_', "") == normalized)
            .ok_or_else(|| format!("unknown feature extractor kind '{}'", s))
    }
}

/// Largest accepted sigma; the halo read around every tile is `ceil(3 * sigma)`
pub const MAX_SIGMA: f32 = 64.0;

/// A configured feature extractor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureExtractor {
    pub kind: FeatureExtractorKind,
    pub sigma: f32,
}

impl FeatureExtractor {
    pub fn new(kind: FeatureExtractorKind, sigma: f32) -> Result<Self, FeatureError> {
        // NaN fails both comparisons
        if !(sigma > 0.0 && sigma <= MAX_SIGMA) {
            return Err(FeatureError::InvalidSigma(sigma));
        }
        Ok(Self { kind, sigma })
    }

    /// Kernel radius, also the context read around every tile
    pub fn halo(&self) -> i64 {
        ((3.0 * self.sigma).ceil() as i64).max(1)
    }

    pub fn num_output_channels(&self, input_channels: u64) -> u64 {
        input_channels * self.kind.channel_multiplier()
    }

    /// Features for the spatial extent of `roi` over all input channels.
    ///
    /// The result spans `roi` clamped to the data source, with channels
    /// `[0, num_output_channels)`.
    pub fn compute(&self, source: &dyn DataSource, roi: &Region) -> Result<FeatureArray, FeatureError> {
        let bounds = source.full_region();
        let roi = roi.clamp(&bounds).with(Axis::C, bounds.get(Axis::C));
        let halo = self.halo();
        let context = roi
            .enlarged(&Point5D::spatial(halo, halo, 0))
            .clamp(&bounds);
        let input = source.retrieve(&context)?.map(f32::from);

        let radius = halo as usize;
        let smooth = gaussian_kernel(self.sigma, radius);
        let features = match self.kind {
            FeatureExtractorKind::GaussianSmoothing => {
                convolve(&convolve(&input, Axis::X, &smooth), Axis::Y, &smooth)
            }
            FeatureExtractorKind::HessianOfGaussian => {
                let first = first_derivative_kernel(self.sigma, &smooth);
                let second = second_derivative_kernel(self.sigma, &smooth);
                let xx = convolve(&convolve(&input, Axis::X, &second), Axis::Y, &smooth);
                let yy = convolve(&convolve(&input, Axis::X, &smooth), Axis::Y, &second);
                let xy = convolve(&convolve(&input, Axis::X, &first), Axis::Y, &first);
                eigenvalues_2d(&xx, &yy, &xy)?
            }
        };

        let channels = self.num_output_channels(source.num_channels()) as i64;
        Ok(features.cut(&roi.with(Axis::C, Interval::new(0, channels)?)))
    }
}

fn gaussian_kernel(sigma: f32, radius: usize) -> Vec<f32> {
    let r = radius as i64;
    let weights: Vec<f32> = (-r..=r)
        .map(|i| (-(i * i) as f32 / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

fn first_derivative_kernel(sigma: f32, gaussian: &[f32]) -> Vec<f32> {
    let r = (gaussian.len() / 2) as i64;
    gaussian
        .iter()
        .zip(-r..=r)
        .map(|(g, i)| -(i as f32) / (sigma * sigma) * g)
        .collect()
}

fn second_derivative_kernel(sigma: f32, gaussian: &[f32]) -> Vec<f32> {
    let r = (gaussian.len() / 2) as i64;
    let s2 = sigma * sigma;
    let weights: Vec<f32> = gaussian
        .iter()
        .zip(-r..=r)
        .map(|(g, i)| ((i * i) as f32 / (s2 * s2) - 1.0 / s2) * g)
        .collect();
    // a second derivative must not respond to constant input
    let mean = weights.iter().sum::<f32>() / weights.len() as f32;
    weights.into_iter().map(|w| w - mean).collect()
}

/// 1D convolution along `axis` with clamp-to-edge boundaries
fn convolve(input: &FeatureArray, axis: Axis, kernel: &[f32]) -> FeatureArray {
    let stride = input.stride(axis);
    let extent = input.shape()[axis] as usize;
    let radius = kernel.len() / 2;
    let source = input.as_slice();
    let mut output = input.clone();
    if extent == 0 {
        return output;
    }
    for (i, value) in output.as_mut_slice().iter_mut().enumerate() {
        let coord = (i / stride) % extent;
        let base = i - coord * stride;
        let mut acc = 0.0f32;
        for (k, weight) in kernel.iter().enumerate() {
            let neighbour = (coord + k).saturating_sub(radius).min(extent - 1);
            acc += weight * source[base + neighbour * stride];
        }
        *value = acc;
    }
    output
}

/// Eigenvalues of the 2x2 Hessian per pixel, larger first; channel `c`
/// of the input yields output channels `2c` and `2c + 1`
fn eigenvalues_2d(
    xx: &FeatureArray,
    yy: &FeatureArray,
    xy: &FeatureArray,
) -> Result<FeatureArray, FeatureError> {
    let channels = xx.shape()[Axis::C] as usize;
    let times = xx.shape()[Axis::T] as usize;
    let region = xx
        .region()
        .with(Axis::C, Interval::new(0, 2 * channels as i64)?);
    let mut output = FeatureArray::allocate(&region, 0.0)?;

    let plane = xx.stride(Axis::C);
    let (in_t, out_t) = (xx.stride(Axis::T), output.stride(Axis::T));
    let out = output.as_mut_slice();
    for t in 0..times {
        for c in 0..channels {
            for j in 0..plane {
                let i = t * in_t + c * plane + j;
                let (a, b, d) = (xx.as_slice()[i], yy.as_slice()[i], xy.as_slice()[i]);
                let mean = (a + b) / 2.0;
                let spread = (((a - b) / 2.0).powi(2) + d * d).sqrt();
                out[t * out_t + 2 * c * plane + j] = mean + spread;
                out[t * out_t + (2 * c + 1) * plane + j] = mean - spread;
            }
        }
    }
    Ok(output)
}
