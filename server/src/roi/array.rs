//! Dense five-dimensional arrays anchored on a region
//!
//! Storage is `t, c, z, y, x` with `x` varying fastest. Serialization to and
//! from other layouts goes through [`Array5::raw`] / [`Array5::from_raw`],
//! where the *first* listed axis varies fastest (column-major order).

use std::fmt;

use super::point::{Axis, Point5D};
use super::region::{Region, RegionError, Shape};

/// Largest number of elements a single array may hold
const MAX_ELEMENTS: u64 = 1 << 32;

/// Element types an array can hold
pub trait Element: Copy + Default + PartialEq + Send + Sync + fmt::Debug + 'static {}

impl Element for u8 {}
impl Element for f32 {}

/// Dense storage over exactly one bounded region
#[derive(Debug, Clone, PartialEq)]
pub struct Array5<T> {
    region: Region,
    shape: Shape,
    data: Vec<T>,
}

/// 8-bit samples: raw data, scribblings and predictions
pub type Buffer = Array5<u8>;

/// Floating point feature images
pub type FeatureArray = Array5<f32>;

fn element_count(region: &Region, shape: &Shape) -> Result<usize, RegionError> {
    let volume = shape.volume();
    if volume > MAX_ELEMENTS {
        return Err(RegionError::TooLarge(region.to_string()));
    }
    Ok(volume as usize)
}

/// Strides of a layout in which `order[0]` varies fastest; axes missing from
/// `order` must have extent 1
fn layout_strides(shape: &Shape, order: &[Axis]) -> Result<[usize; 5], RegionError> {
    let order_name = || order.iter().map(|a| a.as_char()).collect::<String>();
    let mut strides = [0usize; 5];
    let mut seen = [false; 5];
    let mut step = 1usize;
    for axis in order {
        if seen[axis.index()] {
            return Err(RegionError::InvalidAxisOrder(order_name()));
        }
        seen[axis.index()] = true;
        strides[axis.index()] = step;
        step *= shape[*axis] as usize;
    }
    for axis in Axis::ALL {
        if !seen[axis.index()] && shape[axis] != 1 {
            return Err(RegionError::InvalidAxisOrder(order_name()));
        }
    }
    Ok(strides)
}

/// Visit every local index of `shape` in storage order
fn for_each_index(shape: &Shape, mut f: impl FnMut([usize; 5])) {
    let extent = |axis: Axis| shape[axis] as usize;
    for t in 0..extent(Axis::T) {
        for c in 0..extent(Axis::C) {
            for z in 0..extent(Axis::Z) {
                for y in 0..extent(Axis::Y) {
                    for x in 0..extent(Axis::X) {
                        // indexed by Axis::index(): t, c, x, y, z
                        f([t, c, x, y, z]);
                    }
                }
            }
        }
    }
}

fn dot(index: &[usize; 5], strides: &[usize; 5]) -> usize {
    index.iter().zip(strides).map(|(i, s)| i * s).sum()
}

impl<T: Element> Array5<T> {
    /// Allocate an array over `region` filled with `fill`
    pub fn allocate(region: &Region, fill: T) -> Result<Self, RegionError> {
        let shape = region.shape()?;
        let len = element_count(region, &shape)?;
        Ok(Self {
            region: *region,
            shape,
            data: vec![fill; len],
        })
    }

    /// Wrap data already laid out in storage order
    pub fn from_vec(region: &Region, data: Vec<T>) -> Result<Self, RegionError> {
        let shape = region.shape()?;
        let expected = element_count(region, &shape)?;
        if data.len() != expected {
            return Err(RegionError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            region: *region,
            shape,
            data,
        })
    }

    /// Build from data laid out with `order[0]` varying fastest
    pub fn from_raw(region: &Region, order: &[Axis], data: &[T]) -> Result<Self, RegionError> {
        let mut array = Self::allocate(region, T::default())?;
        if data.len() != array.data.len() {
            return Err(RegionError::LengthMismatch {
                expected: array.data.len(),
                actual: data.len(),
            });
        }
        let source_strides = layout_strides(&array.shape, order)?;
        let storage_strides = array.storage_strides();
        let target = &mut array.data;
        for_each_index(&array.shape, |index| {
            target[dot(&index, &storage_strides)] = data[dot(&index, &source_strides)];
        });
        Ok(array)
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    fn storage_strides(&self) -> [usize; 5] {
        let extent = |axis: Axis| self.shape[axis] as usize;
        let x = 1;
        let y = extent(Axis::X);
        let z = y * extent(Axis::Y);
        let c = z * extent(Axis::Z);
        let t = c * extent(Axis::C);
        [t, c, x, y, z]
    }

    /// Distance in elements between neighbours along `axis`
    pub fn stride(&self, axis: Axis) -> usize {
        self.storage_strides()[axis.index()]
    }

    fn offset(&self, point: &Point5D) -> Option<usize> {
        if !self.region.contains_point(point) {
            return None;
        }
        let start = self.region.start();
        let strides = self.storage_strides();
        Some(
            Axis::ALL
                .iter()
                .map(|axis| (point[*axis] - start[*axis]) as usize * strides[axis.index()])
                .sum(),
        )
    }

    pub fn get(&self, point: &Point5D) -> Option<T> {
        self.offset(point).map(|i| self.data[i])
    }

    /// Set one cell; returns false if `point` lies outside the array
    pub fn set_at(&mut self, point: &Point5D, value: T) -> bool {
        match self.offset(point) {
            Some(i) => {
                self.data[i] = value;
                true
            }
            None => false,
        }
    }

    /// Copy the geometric overlap of `other` into `self`.
    ///
    /// Content of `other` outside `self`'s region is silently dropped.
    /// Returns the number of cells written.
    pub fn write_cropped(&mut self, other: &Array5<T>) -> u64 {
        let Some(overlap) = self.region.intersection(&other.region) else {
            return 0;
        };
        let x = overlap.get(Axis::X);
        let run = (x.stop() - x.start()) as usize;
        let mut written = 0u64;
        for t in overlap.get(Axis::T).start()..overlap.get(Axis::T).stop() {
            for c in overlap.get(Axis::C).start()..overlap.get(Axis::C).stop() {
                for z in overlap.get(Axis::Z).start()..overlap.get(Axis::Z).stop() {
                    for y in overlap.get(Axis::Y).start()..overlap.get(Axis::Y).stop() {
                        let row = Point5D::new(t, c, x.start(), y, z);
                        if let (Some(dst), Some(src)) = (self.offset(&row), other.offset(&row)) {
                            self.data[dst..dst + run].copy_from_slice(&other.data[src..src + run]);
                            written += run as u64;
                        }
                    }
                }
            }
        }
        written
    }

    /// Copy of the part of this array inside `roi` (clamped to the array)
    pub fn cut(&self, roi: &Region) -> Array5<T> {
        let region = roi.clamp(&self.region);
        // a clamped region of a bounded array is bounded and no larger than it
        let mut out = Self {
            region,
            shape: region.shape().unwrap_or_default(),
            data: Vec::new(),
        };
        out.data = vec![T::default(); out.shape.volume() as usize];
        out.write_cropped(self);
        out
    }

    /// Same data anchored on a translated region
    pub fn translated(mut self, offset: &Point5D) -> Self {
        self.region = self.region.translate(offset);
        self
    }

    /// Element-wise conversion
    pub fn map<U: Element>(&self, f: impl Fn(T) -> U) -> Array5<U> {
        Array5 {
            region: self.region,
            shape: self.shape,
            data: self.data.iter().copied().map(f).collect(),
        }
    }

    /// Serialize with `order[0]` varying fastest; axes missing from `order`
    /// must have extent 1
    pub fn raw(&self, order: &[Axis]) -> Result<Vec<T>, RegionError> {
        let target_strides = layout_strides(&self.shape, order)?;
        let storage_strides = self.storage_strides();
        let mut out = vec![T::default(); self.data.len()];
        for_each_index(&self.shape, |index| {
            out[dot(&index, &target_strides)] = self.data[dot(&index, &storage_strides)];
        });
        Ok(out)
    }
}
