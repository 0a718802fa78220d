//! Axis identities and five-dimensional points

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the five named axes every volume is addressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    T,
    C,
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in storage order (slowest first)
    pub const ALL: [Axis; 5] = [Axis::T, Axis::C, Axis::Z, Axis::Y, Axis::X];

    /// Spatial axes
    pub const SPATIAL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Position of this axis in per-axis arrays
    pub const fn index(self) -> usize {
        match self {
            Axis::T => 0,
            Axis::C => 1,
            Axis::X => 2,
            Axis::Y => 3,
            Axis::Z => 4,
        }
    }

    pub const fn as_char(self) -> char {
        match self {
            Axis::T => 't',
            Axis::C => 'c',
            Axis::X => 'x',
            Axis::Y => 'y',
            Axis::Z => 'z',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            't' => Some(Axis::T),
            'c' => Some(Axis::C),
            'x' => Some(Axis::X),
            'y' => Some(Axis::Y),
            'z' => Some(Axis::Z),
            _ => None,
        }
    }

    /// Parse an axis order such as `"xyzct"`.
    ///
    /// Returns `None` if a character is not an axis or an axis repeats.
    pub fn parse_order(order: &str) -> Option<Vec<Axis>> {
        let mut axes = Vec::with_capacity(order.len());
        for c in order.chars() {
            let axis = Axis::from_char(c)?;
            if axes.contains(&axis) {
                return None;
            }
            axes.push(axis);
        }
        Some(axes)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Axis::from_char(c).ok_or_else(|| format!("unknown axis '{}'", s)),
            _ => Err(format!("unknown axis '{}'", s)),
        }
    }
}

/// Integer coordinates on every axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point5D {
    coords: [i64; 5],
}

impl Point5D {
    pub const fn zero() -> Self {
        Self { coords: [0; 5] }
    }

    pub const fn new(t: i64, c: i64, x: i64, y: i64, z: i64) -> Self {
        Self {
            coords: [t, c, x, y, z],
        }
    }

    /// A point with only spatial coordinates set
    pub const fn spatial(x: i64, y: i64, z: i64) -> Self {
        Self::new(0, 0, x, y, z)
    }

    pub fn get(&self, axis: Axis) -> i64 {
        self.coords[axis.index()]
    }

    /// Copy of this point with one coordinate replaced
    pub fn with(mut self, axis: Axis, value: i64) -> Self {
        self.coords[axis.index()] = value;
        self
    }

    pub fn min(&self, other: &Point5D) -> Point5D {
        let mut out = *self;
        for axis in Axis::ALL {
            out[axis] = self[axis].min(other[axis]);
        }
        out
    }

    pub fn max(&self, other: &Point5D) -> Point5D {
        let mut out = *self;
        for axis in Axis::ALL {
            out[axis] = self[axis].max(other[axis]);
        }
        out
    }
}

impl Index<Axis> for Point5D {
    type Output = i64;

    fn index(&self, axis: Axis) -> &i64 {
        &self.coords[axis.index()]
    }
}

impl IndexMut<Axis> for Point5D {
    fn index_mut(&mut self, axis: Axis) -> &mut i64 {
        &mut self.coords[axis.index()]
    }
}

impl fmt::Display for Point5D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(t={}, c={}, x={}, y={}, z={})",
            self[Axis::T],
            self[Axis::C],
            self[Axis::X],
            self[Axis::Y],
            self[Axis::Z]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order() {
        assert_eq!(
            Axis::parse_order("xyzc"),
            Some(vec![Axis::X, Axis::Y, Axis::Z, Axis::C])
        );
        assert_eq!(Axis::parse_order("xx"), None);
        assert_eq!(Axis::parse_order("xq"), None);
    }

    #[test]
    fn test_point_min_max() {
        let a = Point5D::spatial(1, 5, 3);
        let b = Point5D::spatial(4, 2, 3);
        assert_eq!(a.min(&b), Point5D::spatial(1, 2, 3));
        assert_eq!(a.max(&b), Point5D::spatial(4, 5, 3));
    }

    #[test]
    fn test_axis_from_str() {
        assert_eq!("x".parse::<Axis>(), Ok(Axis::X));
        assert_eq!("T".parse::<Axis>(), Ok(Axis::T));
        assert!("xy".parse::<Axis>().is_err());
    }
}
