//! In-memory data source built from decoded images or raw bytes

use image::{DynamicImage, ImageFormat};
use tracing::{debug, info};

use crate::roi::{Axis, Buffer, Region, Shape};

use super::service::DataSource;
use super::types::{DataSourceDescriptor, DataSourceError};

/// Layout of raw sample uploads: x fastest, then y, z, c
pub const RAW_SAMPLE_ORDER: [Axis; 5] = [Axis::X, Axis::Y, Axis::Z, Axis::C, Axis::T];

/// Interleaved image pixels: channel fastest, then x, y
const IMAGE_SAMPLE_ORDER: [Axis; 5] = [Axis::C, Axis::X, Axis::Y, Axis::Z, Axis::T];

/// Data source holding every sample in memory
#[derive(Debug)]
pub struct ArrayDataSource {
    data: Buffer,
    tile_shape: Shape,
    format: String,
}

impl ArrayDataSource {
    /// Wrap an existing buffer
    pub fn new(data: Buffer, tile_shape: Shape, format: impl Into<String>) -> Result<Self, DataSourceError> {
        if Axis::SPATIAL.iter().any(|axis| tile_shape[*axis] == 0) {
            return Err(DataSourceError::InvalidShape(format!(
                "tile shape must be positive, got {:?}",
                tile_shape.to_tuple(&Axis::SPATIAL)
            )));
        }
        Ok(Self {
            data,
            tile_shape,
            format: format.into(),
        })
    }

    /// Decode an encoded 2D image (PNG, JPEG).
    ///
    /// Grayscale images yield one channel; everything else is converted to RGB.
    pub fn from_image_bytes(bytes: &[u8], tile_shape: Shape) -> Result<Self, DataSourceError> {
        let format = image::guess_format(bytes)
            .map(format_name)
            .unwrap_or("unknown");
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| DataSourceError::Decode(e.to_string()))?;

        let (width, height) = (decoded.width() as u64, decoded.height() as u64);
        let (channels, samples) = match decoded.color().channel_count() {
            1 | 2 => (1, DynamicImage::into_luma8(decoded).into_raw()),
            _ => (3, DynamicImage::into_rgb8(decoded).into_raw()),
        };

        let region = Region::from_shape(&Shape::new(1, channels, width, height, 1));
        let data = Buffer::from_raw(&region, &IMAGE_SAMPLE_ORDER, &samples)?;
        info!(
            "Decoded {} image data source: {}x{} with {} channel(s)",
            format, width, height, channels
        );
        Self::new(data, tile_shape, format)
    }

    /// Wrap headerless samples laid out as [`RAW_SAMPLE_ORDER`]
    pub fn from_raw_bytes(bytes: &[u8], shape: Shape, tile_shape: Shape) -> Result<Self, DataSourceError> {
        if shape.get(Axis::T) != 1 {
            return Err(DataSourceError::InvalidShape(
                "raw data sources hold a single time point".to_string(),
            ));
        }
        let region = Region::from_shape(&shape);
        let data = Buffer::from_raw(&region, &RAW_SAMPLE_ORDER, bytes)?;
        debug!("Loaded raw data source over {}", region);
        Self::new(data, tile_shape, "raw")
    }
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        _ => "image",
    }
}

impl DataSource for ArrayDataSource {
    fn full_region(&self) -> Region {
        *self.data.region()
    }

    fn tile_shape(&self) -> Shape {
        self.tile_shape
    }

    fn retrieve(&self, roi: &Region) -> Result<Buffer, DataSourceError> {
        let bounds = self.full_region();
        if !bounds.contains(roi) || !roi.is_bounded() {
            return Err(DataSourceError::OutOfBounds {
                requested: *roi,
                bounds,
            });
        }
        Ok(self.data.cut(roi))
    }

    fn descriptor(&self) -> DataSourceDescriptor {
        let shape = self.data.shape();
        DataSourceDescriptor {
            format: self.format.clone(),
            size: [shape[Axis::X], shape[Axis::Y], shape[Axis::Z]],
            num_channels: shape[Axis::C],
            tile_shape: [
                self.tile_shape[Axis::X],
                self.tile_shape[Axis::Y],
                self.tile_shape[Axis::Z],
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roi::{Interval, Point5D};
    use image::{GrayImage, ImageEncoder, RgbImage, codecs::png::PngEncoder};

    fn png_bytes(width: u32, height: u32, gray: bool) -> Vec<u8> {
        let mut out = Vec::new();
        let encoder = PngEncoder::new(&mut out);
        if gray {
            let img = GrayImage::from_fn(width, height, |x, y| image::Luma([(x + 10 * y) as u8]));
            encoder
                .write_image(img.as_raw(), width, height, image::ExtendedColorType::L8)
                .unwrap();
        } else {
            let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([x as u8, y as u8, 200]));
            encoder
                .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
                .unwrap();
        }
        out
    }

    #[test]
    fn test_from_grayscale_png() {
        let source = ArrayDataSource::from_image_bytes(&png_bytes(6, 4, true), Shape::spatial(4, 4, 1)).unwrap();
        assert_eq!(
            source.full_region().shape().unwrap(),
            Shape::new(1, 1, 6, 4, 1)
        );
        let all = source.retrieve(&source.full_region()).unwrap();
        assert_eq!(all.get(&Point5D::spatial(3, 2, 0)), Some(23));
        assert_eq!(source.descriptor().format, "png");
    }

    #[test]
    fn test_from_rgb_png_interleaving() {
        let source = ArrayDataSource::from_image_bytes(&png_bytes(5, 3, false), Shape::spatial(4, 4, 1)).unwrap();
        assert_eq!(source.num_channels(), 3);
        let all = source.retrieve(&source.full_region()).unwrap();
        assert_eq!(all.get(&Point5D::new(0, 0, 4, 1, 0)), Some(4));
        assert_eq!(all.get(&Point5D::new(0, 1, 4, 1, 0)), Some(1));
        assert_eq!(all.get(&Point5D::new(0, 2, 4, 1, 0)), Some(200));
    }

    #[test]
    fn test_from_garbage_fails() {
        assert!(matches!(
            ArrayDataSource::from_image_bytes(b"not an image", Shape::spatial(4, 4, 1)),
            Err(DataSourceError::Decode(_))
        ));
    }

    #[test]
    fn test_from_raw_bytes_layout() {
        let shape = Shape::new(1, 2, 3, 2, 1);
        let bytes: Vec<u8> = (0..12).collect();
        let source = ArrayDataSource::from_raw_bytes(&bytes, shape, Shape::spatial(2, 2, 1)).unwrap();
        let all = source.retrieve(&source.full_region()).unwrap();
        // x fastest, then y, then c
        assert_eq!(all.get(&Point5D::new(0, 0, 1, 0, 0)), Some(1));
        assert_eq!(all.get(&Point5D::new(0, 0, 0, 1, 0)), Some(3));
        assert_eq!(all.get(&Point5D::new(0, 1, 0, 0, 0)), Some(6));
    }

    #[test]
    fn test_retrieve_out_of_bounds() {
        let source = ArrayDataSource::from_raw_bytes(&[0; 16], Shape::spatial(4, 4, 1), Shape::spatial(2, 2, 1)).unwrap();
        let roi = source
            .full_region()
            .with(Axis::X, Interval::new(2, 6).unwrap());
        assert!(matches!(
            source.retrieve(&roi),
            Err(DataSourceError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_tiles_span_all_channels() {
        let source = ArrayDataSource::from_raw_bytes(&[0; 75], Shape::new(1, 3, 5, 5, 1), Shape::spatial(2, 2, 1)).unwrap();
        let tiles: Vec<Region> = source.tiles().unwrap().collect();
        assert_eq!(tiles.len(), 9);
        assert!(tiles.iter().all(|t| t.get(Axis::C) == Interval::new(0, 3).unwrap()));
    }

    #[test]
    fn test_zero_tile_shape_rejected() {
        assert!(matches!(
            ArrayDataSource::from_raw_bytes(&[0; 4], Shape::spatial(2, 2, 1), Shape::spatial(0, 2, 1)),
            Err(DataSourceError::InvalidShape(_))
        ));
    }
}
