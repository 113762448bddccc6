use core::fmt;

use grid_util::grid::{BoolGrid, ValueGrid};
use itertools::Itertools;
use smallvec::{smallvec, SmallVec};

use crate::coord::Coord;
use crate::error::PlanError;
use crate::INLINE_DIMS;

pub type Offset = SmallVec<[i32; INLINE_DIMS]>;

/// Which moves a grid search may take from a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Connectivity {
    /// All `3^N - 1` offsets in `{-1, 0, 1}^N`, diagonals included.
    #[default]
    Full,
    /// Only the `2N` unit steps along a single axis.
    Axis,
}

/// Enumerates the move offsets of the given connectivity. The order is fixed, which keeps search
/// results reproducible between runs.
pub fn neighbor_offsets(ndim: usize, connectivity: Connectivity) -> Vec<Offset> {
    match connectivity {
        Connectivity::Full => itertools::repeat_n(-1i32..=1, ndim)
            .multi_cartesian_product()
            .filter(|o| o.iter().any(|&d| d != 0))
            .map(Offset::from_vec)
            .collect(),
        Connectivity::Axis => (0..ndim)
            .flat_map(|axis| {
                [-1, 1].into_iter().map(move |d| {
                    let mut o: Offset = smallvec![0; ndim];
                    o[axis] = d;
                    o
                })
            })
            .collect(),
    }
}

/// An N-dimensional occupancy grid stored in row-major order (last axis fastest). A cell is
/// either free ([false]) or an obstacle ([true]), the same convention as [BoolGrid].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupancyGrid {
    shape: SmallVec<[usize; INLINE_DIMS]>,
    strides: SmallVec<[usize; INLINE_DIMS]>,
    cells: Vec<bool>,
}

fn strides_for(shape: &[usize]) -> SmallVec<[usize; INLINE_DIMS]> {
    let mut strides: SmallVec<[usize; INLINE_DIMS]> = smallvec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

impl OccupancyGrid {
    /// Creates a grid of the given shape with every cell set to `blocked`.
    ///
    /// # Panics
    /// If `shape` is empty.
    pub fn new(shape: &[usize], blocked: bool) -> OccupancyGrid {
        assert!(!shape.is_empty(), "grid must have at least one dimension");
        OccupancyGrid {
            shape: SmallVec::from_slice(shape),
            strides: strides_for(shape),
            cells: vec![blocked; shape.iter().product()],
        }
    }

    pub fn from_cells(shape: &[usize], cells: Vec<bool>) -> Result<OccupancyGrid, PlanError> {
        if shape.is_empty() {
            return Err(PlanError::EmptyShape);
        }
        let expected: usize = shape.iter().product();
        if cells.len() != expected {
            return Err(PlanError::ShapeMismatch {
                shape: shape.to_vec(),
                expected,
                found: cells.len(),
            });
        }
        Ok(OccupancyGrid {
            shape: SmallVec::from_slice(shape),
            strides: strides_for(shape),
            cells,
        })
    }

    /// Builds a 2-D grid from rows of cell values where any non-zero value is an obstacle. Row
    /// `r`, column `c` becomes cell `(r, c)`.
    pub fn from_rows<R: AsRef<[u8]>>(rows: &[R]) -> Result<OccupancyGrid, PlanError> {
        let width = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut cells = Vec::with_capacity(rows.len() * width);
        for (row, values) in rows.iter().enumerate() {
            let values = values.as_ref();
            if values.len() != width {
                return Err(PlanError::RaggedRows {
                    row,
                    expected: width,
                    found: values.len(),
                });
            }
            cells.extend(values.iter().map(|&v| v != 0));
        }
        OccupancyGrid::from_cells(&[rows.len(), width], cells)
    }

    /// Creates a grid whose occupancy is decided per cell by `blocked`.
    pub fn from_fn<F>(shape: &[usize], mut blocked: F) -> OccupancyGrid
    where
        F: FnMut(&Coord) -> bool,
    {
        let mut grid = OccupancyGrid::new(shape, false);
        for ix in 0..grid.cells.len() {
            let coord = grid.unflatten(ix);
            grid.cells[ix] = blocked(&coord);
        }
        grid
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub fn obstacle_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Fraction of cells that are obstacles.
    pub fn obstacle_density(&self) -> f64 {
        if self.cells.is_empty() {
            return 0.0;
        }
        self.obstacle_count() as f64 / self.cells.len() as f64
    }

    /// True when the cell has the grid's rank and lies within its bounds.
    pub fn is_valid(&self, cell: &[i32]) -> bool {
        cell.len() == self.shape.len()
            && cell
                .iter()
                .zip(&self.shape)
                .all(|(&c, &extent)| c >= 0 && (c as usize) < extent)
    }

    pub fn flat_index(&self, cell: &[i32]) -> Option<usize> {
        if !self.is_valid(cell) {
            return None;
        }
        Some(
            cell.iter()
                .zip(&self.strides)
                .map(|(&c, &s)| c as usize * s)
                .sum(),
        )
    }

    pub fn unflatten(&self, mut ix: usize) -> Coord {
        self.strides
            .iter()
            .map(|&s| {
                let c = ix / s;
                ix %= s;
                c as i32
            })
            .collect()
    }

    /// Occupancy of a cell, [None] when it lies outside the grid.
    pub fn get(&self, cell: &[i32]) -> Option<bool> {
        self.flat_index(cell).map(|ix| self.cells[ix])
    }

    pub fn is_blocked(&self, cell: &[i32]) -> bool {
        self.get(cell) == Some(true)
    }

    /// Valid and not an obstacle.
    pub fn is_free(&self, cell: &[i32]) -> bool {
        self.get(cell) == Some(false)
    }

    /// Updates a cell. Cells outside the grid are ignored.
    pub fn set(&mut self, cell: &[i32], blocked: bool) {
        if let Some(ix) = self.flat_index(cell) {
            self.cells[ix] = blocked;
        }
    }

    pub(crate) fn set_index(&mut self, ix: usize, blocked: bool) {
        self.cells[ix] = blocked;
    }

    /// Fails when `cell` has a different number of dimensions than the grid.
    pub fn check_rank(&self, what: &'static str, cell: &[i32]) -> Result<(), PlanError> {
        if cell.len() != self.ndim() {
            return Err(PlanError::DimensionMismatch {
                what,
                expected: self.ndim(),
                found: cell.len(),
            });
        }
        Ok(())
    }

    /// Iterates over every cell coordinate in storage order.
    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.cells.len()).map(|ix| self.unflatten(ix))
    }

    /// Free cells reachable from `cell` in one move of the given offsets.
    pub fn free_neighbors<'a>(
        &'a self,
        cell: &'a Coord,
        offsets: &'a [Offset],
    ) -> impl Iterator<Item = Coord> + 'a {
        offsets
            .iter()
            .map(move |o| cell.offset(o))
            .filter(move |n| self.is_free(n))
    }
}

/// Converts a 2-D [BoolGrid] so that [grid_util::point::Point] `(x, y)` maps to cell `(x, y)`.
impl From<&BoolGrid> for OccupancyGrid {
    fn from(grid: &BoolGrid) -> Self {
        let (w, h) = (grid.width(), grid.height());
        OccupancyGrid::from_fn(&[w, h], |c| grid.get(c[0], c[1]))
    }
}

impl fmt::Display for OccupancyGrid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Grid {:?}:", self.shape.as_slice())?;
        let row_len = self.shape[self.shape.len() - 1];
        for row in self.cells.chunks(row_len.max(1)) {
            let values = row.iter().map(|&c| c as i32).collect::<Vec<i32>>();
            writeln!(f, "{:?}", values)?;
        }
        Ok(())
    }
}
