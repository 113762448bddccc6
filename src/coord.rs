use core::fmt;
use std::ops::Deref;

use grid_util::point::Point;
use smallvec::SmallVec;

use crate::INLINE_DIMS;

/// An integer cell index into an N-dimensional grid. Dimensions up to [INLINE_DIMS] are stored
/// inline, so coordinates of the usual 2-D and 3-D grids never allocate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord(SmallVec<[i32; INLINE_DIMS]>);

impl Coord {
    pub fn new(components: &[i32]) -> Coord {
        Coord(SmallVec::from_slice(components))
    }

    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    /// Applies an offset component-wise.
    pub fn offset(&self, delta: &[i32]) -> Coord {
        self.0.iter().zip(delta).map(|(c, d)| c + d).collect()
    }

    /// Component-wise difference `other - self`.
    pub fn delta_to(&self, other: &Coord) -> SmallVec<[i32; INLINE_DIMS]> {
        self.0.iter().zip(other.iter()).map(|(a, b)| b - a).collect()
    }

    pub fn to_f64(&self) -> SmallVec<[f64; INLINE_DIMS]> {
        self.0.iter().map(|&c| c as f64).collect()
    }

    /// Rounds a continuous position to the nearest cell.
    pub fn round_from(position: &[f64]) -> Coord {
        position.iter().map(|v| v.round() as i32).collect()
    }
}

impl Deref for Coord {
    type Target = [i32];

    fn deref(&self) -> &[i32] {
        &self.0
    }
}

impl FromIterator<i32> for Coord {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        Coord(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[i32; N]> for Coord {
    fn from(components: [i32; N]) -> Self {
        Coord::new(&components)
    }
}

impl From<Vec<i32>> for Coord {
    fn from(components: Vec<i32>) -> Self {
        Coord(SmallVec::from_vec(components))
    }
}

impl From<&[i32]> for Coord {
    fn from(components: &[i32]) -> Self {
        Coord::new(components)
    }
}

/// 2-D points map to `(x, y)`, matching [OccupancyGrid](crate::OccupancyGrid)'s conversion from
/// a [BoolGrid](grid_util::grid::BoolGrid).
impl From<Point> for Coord {
    fn from(point: Point) -> Self {
        Coord::new(&[point.x, point.y])
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (i, c) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
        }
        write!(f, ")")
    }
}
