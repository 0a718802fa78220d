//! PNG previews of a single prediction channel

use image::{ExtendedColorType, ImageEncoder, codecs::png::PngEncoder};

use crate::roi::{Axis, Buffer, Interval, Shape};

use super::types::EncodingError;

fn image_dimensions(shape: &Shape) -> Result<(u32, u32), EncodingError> {
    let (width, height) = (shape[Axis::X], shape[Axis::Y]);
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(EncodingError::PreviewTooLarge { width, height }),
    }
}

/// Encode channel `channel` (relative to the buffer's first channel) of a
/// single-plane buffer as 8-bit grayscale PNG
pub fn encode_preview(buffer: &Buffer, channel: u64) -> Result<Vec<u8>, EncodingError> {
    let region = *buffer.region();
    let shape = buffer.shape();
    if shape[Axis::T] != 1 || shape[Axis::Z] != 1 {
        return Err(EncodingError::NotPlanar(region));
    }
    if channel >= shape[Axis::C] {
        return Err(EncodingError::ChannelOutOfRange {
            channel,
            channels: shape[Axis::C],
        });
    }
    if shape[Axis::X] == 0 || shape[Axis::Y] == 0 {
        return Err(EncodingError::Empty(region));
    }
    let (width, height) = image_dimensions(&shape)?;

    let selected = region.get(Axis::C).start() + channel as i64;
    let plane = buffer.cut(&region.with(Axis::C, Interval::single(selected)));

    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(
        plane.as_slice(),
        width,
        height,
        ExtendedColorType::L8,
    )?;
    Ok(png)
}
