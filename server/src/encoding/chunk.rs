//! Raw chunk protocol
//!
//! A chunk is addressed by `{x0}-{x1}_{y0}-{y1}_{z0}-{z1}` and carried as
//! headerless `u8` samples with `x` varying fastest, then `y`, `z`, `c`.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::roi::{Axis, Buffer, Interval, Region};

use super::types::EncodingError;

/// Sample order of a raw chunk body, fastest first
pub const RAW_CHUNK_AXES: [Axis; 5] = [Axis::X, Axis::Y, Axis::Z, Axis::C, Axis::T];

/// Spatial address of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl ChunkKey {
    /// Region of the chunk; `t` and `c` are left unbounded
    pub fn region(&self) -> Region {
        Region::all()
            .with(Axis::X, self.x)
            .with(Axis::Y, self.y)
            .with(Axis::Z, self.z)
    }
}

impl FromStr for ChunkKey {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('_').collect();
        let [x, y, z] = parts.as_slice() else {
            return Err(EncodingError::InvalidChunkKey(s.to_string()));
        };
        Ok(Self {
            x: Interval::parse(x, '-')?,
            y: Interval::parse(y, '-')?,
            z: Interval::parse(z, '-')?,
        })
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}_{}-{}_{}-{}",
            self.x.start(),
            self.x.stop(),
            self.y.start(),
            self.y.stop(),
            self.z.start(),
            self.z.stop()
        )
    }
}

pub fn encode_raw_chunk(buffer: &Buffer) -> Result<Bytes, EncodingError> {
    Ok(Bytes::from(buffer.raw(&RAW_CHUNK_AXES)?))
}

/// Inverse of [`encode_raw_chunk`] for a buffer spanning `region`
pub fn decode_raw_chunk(bytes: &[u8], region: &Region) -> Result<Buffer, EncodingError> {
    Ok(Buffer::from_raw(region, &RAW_CHUNK_AXES, bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roi::{Point5D, RegionError, Shape};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_parse_and_display() {
        let key: ChunkKey = "0-64_64-128_0-10".parse().unwrap();
        assert_eq!(key.x, Interval::new(0, 64).unwrap());
        assert_eq!(key.y, Interval::new(64, 128).unwrap());
        assert_eq!(key.z, Interval::new(0, 10).unwrap());
        assert_eq!(key.to_string(), "0-64_64-128_0-10");
        assert!(!key.region().get(Axis::C).is_bounded());
    }

    #[test]
    fn test_parse_rejects_malformed_keys() {
        assert!(matches!(
            "0-64_0-64".parse::<ChunkKey>(),
            Err(EncodingError::InvalidChunkKey(_))
        ));
        assert!(matches!(
            "0-64_0-64_a-b".parse::<ChunkKey>(),
            Err(EncodingError::Region(RegionError::MalformedInterval(_)))
        ));
        assert!(matches!(
            "64-0_0-64_0-1".parse::<ChunkKey>(),
            Err(EncodingError::Region(RegionError::InvertedInterval { .. }))
        ));
    }

    #[test]
    fn test_layout_is_x_fastest_then_channel_last() {
        let region = Region::from_shape(&Shape::new(1, 2, 2, 2, 1));
        let mut buffer = Buffer::allocate(&region, 0).unwrap();
        buffer.set_at(&Point5D::new(0, 0, 1, 0, 0), 1);
        buffer.set_at(&Point5D::new(0, 0, 0, 1, 0), 2);
        buffer.set_at(&Point5D::new(0, 1, 0, 0, 0), 3);
        let bytes = encode_raw_chunk(&buffer).unwrap();
        assert_eq!(bytes.as_ref(), &[0, 1, 2, 0, 3, 0, 0, 0]);
    }

    #[test]
    fn test_decode_reconstructs_random_buffers() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..20 {
            let shape = Shape::new(
                1,
                rng.random_range(1..4),
                rng.random_range(1..9),
                rng.random_range(1..9),
                rng.random_range(1..5),
            );
            let start = Point5D::spatial(rng.random_range(0..100), rng.random_range(0..100), 0);
            let region = Region::from_start_shape(&start, &shape);
            let data: Vec<u8> = (0..shape.volume()).map(|_| rng.random()).collect();
            let buffer = Buffer::from_vec(&region, data).unwrap();

            let bytes = encode_raw_chunk(&buffer).unwrap();
            assert_eq!(bytes.len() as u64, shape.volume());
            assert_eq!(decode_raw_chunk(&bytes, &region).unwrap(), buffer);
        }
    }
}
