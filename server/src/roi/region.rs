//! Half-open intervals, regions, shapes and grid tiling

use std::fmt;
use std::ops::Index;

use serde::Serialize;
use thiserror::Error;

use super::point::{Axis, Point5D};

/// Sentinel start of an interval that is unbounded below
pub const UNBOUNDED_START: i64 = i64::MIN;
/// Sentinel stop of an interval that is unbounded above
pub const UNBOUNDED_STOP: i64 = i64::MAX;

/// Errors produced by region construction and buffer geometry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegionError {
    #[error("Inverted interval: [{start}, {stop})")]
    InvertedInterval { start: i64, stop: i64 },

    #[error("Malformed interval '{0}'")]
    MalformedInterval(String),

    #[error("Region is unbounded on axis {0}")]
    Unbounded(Axis),

    #[error("Region {0} is too large to allocate")]
    TooLarge(String),

    #[error("Data length mismatch: expected {expected} elements, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Axis order '{0}' must name each of t, c, x, y, z exactly once")]
    InvalidAxisOrder(String),

    #[error("Coordinate {0} is out of range")]
    CoordinateOutOfRange(String),
}

/// Half-open `[start, stop)` span on one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    start: i64,
    stop: i64,
}

impl Interval {
    pub fn new(start: i64, stop: i64) -> Result<Self, RegionError> {
        if start > stop {
            return Err(RegionError::InvertedInterval { start, stop });
        }
        Ok(Self { start, stop })
    }

    /// Interval unbounded on both ends
    pub const fn all() -> Self {
        Self {
            start: UNBOUNDED_START,
            stop: UNBOUNDED_STOP,
        }
    }

    /// Interval covering exactly one coordinate
    pub const fn single(value: i64) -> Self {
        Self {
            start: value,
            stop: value + 1,
        }
    }

    /// Parse `"{start}{sep}{stop}"`, e.g. `"0_50"` or `"0-64"`
    pub fn parse(s: &str, separator: char) -> Result<Self, RegionError> {
        let malformed = || RegionError::MalformedInterval(s.to_string());
        let (start, stop) = s.split_once(separator).ok_or_else(malformed)?;
        let start = start.trim().parse::<i64>().map_err(|_| malformed())?;
        let stop = stop.trim().parse::<i64>().map_err(|_| malformed())?;
        Self::new(start, stop)
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn stop(&self) -> i64 {
        self.stop
    }

    pub fn is_bounded(&self) -> bool {
        self.start != UNBOUNDED_START && self.stop != UNBOUNDED_STOP
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.stop
    }

    /// Extent of a bounded interval
    pub fn len(&self) -> Option<u64> {
        self.is_bounded().then(|| (self.stop - self.start) as u64)
    }

    /// Clamp both ends into `bounds`; the result is always inside `bounds`
    pub fn clamp(&self, bounds: &Interval) -> Interval {
        Interval {
            start: self.start.clamp(bounds.start, bounds.stop),
            stop: self.stop.clamp(bounds.start, bounds.stop),
        }
    }

    /// True if the two intervals share at least one coordinate
    pub fn intersects(&self, other: &Interval) -> bool {
        self.start.max(other.start) < self.stop.min(other.stop)
    }

    /// True if every coordinate of `other` lies in `self` (empty intervals are contained everywhere)
    pub fn contains(&self, other: &Interval) -> bool {
        other.is_empty() || (self.start <= other.start && other.stop <= self.stop)
    }

    pub fn translate(&self, offset: i64) -> Interval {
        let shift = |v: i64, sentinel: i64| {
            if v == sentinel {
                v
            } else {
                v.saturating_add(offset)
            }
        };
        Interval {
            start: shift(self.start, UNBOUNDED_START),
            stop: shift(self.stop, UNBOUNDED_STOP),
        }
    }

    /// Smallest interval containing both
    pub fn enclosing(&self, other: &Interval) -> Interval {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Interval {
            start: self.start.min(other.start),
            stop: self.stop.max(other.stop),
        }
    }

    /// Grow by `amount` on both ends, leaving unbounded ends untouched
    pub fn enlarged(&self, amount: i64) -> Interval {
        Interval {
            start: if self.start == UNBOUNDED_START {
                self.start
            } else {
                self.start.saturating_sub(amount)
            },
            stop: if self.stop == UNBOUNDED_STOP {
                self.stop
            } else {
                self.stop.saturating_add(amount)
            },
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.stop) {
            (UNBOUNDED_START, UNBOUNDED_STOP) => write!(f, "[..)"),
            (UNBOUNDED_START, stop) => write!(f, "[.., {})", stop),
            (start, UNBOUNDED_STOP) => write!(f, "[{}, ..)", start),
            (start, stop) => write!(f, "[{}, {})", start, stop),
        }
    }
}

/// Per-axis extent of a bounded region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Shape {
    dims: [u64; 5],
}

impl Shape {
    pub const fn new(t: u64, c: u64, x: u64, y: u64, z: u64) -> Self {
        Self {
            dims: [t, c, x, y, z],
        }
    }

    /// Single time point, single channel
    pub const fn spatial(x: u64, y: u64, z: u64) -> Self {
        Self::new(1, 1, x, y, z)
    }

    pub fn get(&self, axis: Axis) -> u64 {
        self.dims[axis.index()]
    }

    pub fn with(mut self, axis: Axis, extent: u64) -> Self {
        self.dims[axis.index()] = extent;
        self
    }

    /// Number of cells, saturating at `u64::MAX`
    pub fn volume(&self) -> u64 {
        self.dims.iter().fold(1u64, |acc, d| acc.saturating_mul(*d))
    }

    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|d| *d == 0)
    }

    /// Extents listed in the given axis order
    pub fn to_tuple(&self, order: &[Axis]) -> Vec<u64> {
        order.iter().map(|axis| self.get(*axis)).collect()
    }
}

impl Index<Axis> for Shape {
    type Output = u64;

    fn index(&self, axis: Axis) -> &u64 {
        &self.dims[axis.index()]
    }
}

/// Axis-aligned box: one half-open interval per axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    intervals: [Interval; 5],
}

impl Region {
    /// Region unbounded on every axis
    pub const fn all() -> Self {
        Self {
            intervals: [Interval::all(); 5],
        }
    }

    /// Single cell at `point`
    pub fn at(point: &Point5D) -> Self {
        let mut region = Self::all();
        for axis in Axis::ALL {
            region = region.with(axis, Interval::single(point[axis]));
        }
        region
    }

    /// Region starting at `start` with the given extents
    pub fn from_start_shape(start: &Point5D, shape: &Shape) -> Self {
        let mut region = Self::all();
        for axis in Axis::ALL {
            let begin = start[axis];
            region = region.with(
                axis,
                Interval {
                    start: begin,
                    stop: begin.saturating_add(shape[axis] as i64),
                },
            );
        }
        region
    }

    /// Region anchored at the origin with the given extents
    pub fn from_shape(shape: &Shape) -> Self {
        Self::from_start_shape(&Point5D::zero(), shape)
    }

    /// Minimal region containing both points; stops are exclusive so each
    /// axis spans `[min, max + 1)`
    pub fn bounding_box(a: &Point5D, b: &Point5D) -> Result<Self, RegionError> {
        let low = a.min(b);
        let high = a.max(b);
        let mut region = Self::all();
        for axis in Axis::ALL {
            let stop = high[axis]
                .checked_add(1)
                .ok_or_else(|| RegionError::CoordinateOutOfRange(high[axis].to_string()))?;
            region = region.with(axis, Interval::new(low[axis], stop)?);
        }
        Ok(region)
    }

    pub fn get(&self, axis: Axis) -> Interval {
        self.intervals[axis.index()]
    }

    pub fn with(mut self, axis: Axis, interval: Interval) -> Self {
        self.intervals[axis.index()] = interval;
        self
    }

    pub fn start(&self) -> Point5D {
        let mut point = Point5D::zero();
        for axis in Axis::ALL {
            point[axis] = self.get(axis).start;
        }
        point
    }

    pub fn stop(&self) -> Point5D {
        let mut point = Point5D::zero();
        for axis in Axis::ALL {
            point[axis] = self.get(axis).stop;
        }
        point
    }

    /// Intersection with `bounds`; always valid, possibly empty
    pub fn clamp(&self, bounds: &Region) -> Region {
        let mut out = *self;
        for axis in Axis::ALL {
            out = out.with(axis, self.get(axis).clamp(&bounds.get(axis)));
        }
        out
    }

    pub fn translate(&self, offset: &Point5D) -> Region {
        let mut out = *self;
        for axis in Axis::ALL {
            out = out.with(axis, self.get(axis).translate(offset[axis]));
        }
        out
    }

    /// Smallest region containing both
    pub fn enclosing(&self, other: &Region) -> Region {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let mut out = *self;
        for axis in Axis::ALL {
            out = out.with(axis, self.get(axis).enclosing(&other.get(axis)));
        }
        out
    }

    /// Grow every axis by the matching coordinate of `halo`
    pub fn enlarged(&self, halo: &Point5D) -> Region {
        let mut out = *self;
        for axis in Axis::ALL {
            out = out.with(axis, self.get(axis).enlarged(halo[axis]));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.iter().any(Interval::is_empty)
    }

    pub fn is_bounded(&self) -> bool {
        self.intervals.iter().all(Interval::is_bounded)
    }

    pub fn intersects(&self, other: &Region) -> bool {
        Axis::ALL
            .iter()
            .all(|axis| self.get(*axis).intersects(&other.get(*axis)))
    }

    /// Non-empty overlap of two regions
    pub fn intersection(&self, other: &Region) -> Option<Region> {
        self.intersects(other).then(|| self.clamp(other))
    }

    pub fn contains(&self, other: &Region) -> bool {
        other.is_empty()
            || Axis::ALL
                .iter()
                .all(|axis| self.get(*axis).contains(&other.get(*axis)))
    }

    pub fn contains_point(&self, point: &Point5D) -> bool {
        Axis::ALL.iter().all(|axis| {
            let interval = self.get(*axis);
            interval.start <= point[*axis] && point[*axis] < interval.stop
        })
    }

    pub fn shape(&self) -> Result<Shape, RegionError> {
        let mut shape = Shape::default();
        for axis in Axis::ALL {
            let extent = self
                .get(axis)
                .len()
                .ok_or(RegionError::Unbounded(axis))?;
            shape = shape.with(axis, extent);
        }
        Ok(shape)
    }

    pub fn volume(&self) -> Result<u64, RegionError> {
        Ok(self.shape()?.volume())
    }

    /// Disjoint grid partition of this region into tiles of `tile_shape`,
    /// anchored at the region start; edge tiles are truncated
    pub fn tiles(&self, tile_shape: Shape) -> Result<Tiles, RegionError> {
        if let Some(axis) = Axis::ALL.iter().find(|a| !self.get(**a).is_bounded()) {
            return Err(RegionError::Unbounded(*axis));
        }
        Ok(Tiles {
            bounds: *self,
            tile_shape,
            cursor: (!self.is_empty()).then(|| self.start()),
        })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [Axis::T, Axis::C, Axis::X, Axis::Y, Axis::Z]
            .iter()
            .map(|axis| format!("{}:{}", axis, self.get(*axis)))
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

/// Lazy, restartable sequence of tiles partitioning a bounded region
#[derive(Debug, Clone)]
pub struct Tiles {
    bounds: Region,
    tile_shape: Shape,
    cursor: Option<Point5D>,
}

impl Tiles {
    fn step(&self, axis: Axis) -> i64 {
        self.tile_shape[axis].clamp(1, i64::MAX as u64) as i64
    }

    /// Advance the grid origin odometer-style, `x` fastest
    fn advance(&self, mut origin: Point5D) -> Option<Point5D> {
        for axis in Axis::ALL.iter().rev() {
            let interval = self.bounds.get(*axis);
            let next = origin[*axis].saturating_add(self.step(*axis));
            if next < interval.stop {
                origin[*axis] = next;
                return Some(origin);
            }
            origin[*axis] = interval.start;
        }
        None
    }
}

impl Iterator for Tiles {
    type Item = Region;

    fn next(&mut self) -> Option<Region> {
        let origin = self.cursor?;
        let mut tile = self.bounds;
        for axis in Axis::ALL {
            let stop = origin[axis]
                .saturating_add(self.step(axis))
                .min(self.bounds.get(axis).stop);
            tile = tile.with(
                axis,
                Interval {
                    start: origin[axis],
                    stop,
                },
            );
        }
        self.cursor = self.advance(origin);
        Some(tile)
    }
}
