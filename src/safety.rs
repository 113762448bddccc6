//! Per-call safety fields derived from an [OccupancyGrid]: the Euclidean clearance to the nearest
//! obstacle and the obstacle-influence potential, plus grid inflation built on the former.
use log::debug;
use smallvec::SmallVec;

use crate::coord::Coord;
use crate::grid::OccupancyGrid;
use crate::INLINE_DIMS;

/// Stand-in for an infinite squared distance inside the distance transform. Large enough to dominate
/// any squared grid distance, small enough to keep the parabola intersections finite.
const FAR: f64 = 1e20;

/// A dense scalar field with the same shape and storage order as its grid.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarField {
    shape: SmallVec<[usize; INLINE_DIMS]>,
    values: Vec<f64>,
}

impl ScalarField {
    pub fn zeros(shape: &[usize]) -> ScalarField {
        ScalarField {
            shape: SmallVec::from_slice(shape),
            values: vec![0.0; shape.iter().product()],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at a flat index.
    pub fn at(&self, ix: usize) -> f64 {
        self.values[ix]
    }

    /// Value at a cell, using `grid` for indexing. [None] outside the grid.
    pub fn get(&self, grid: &OccupancyGrid, cell: &[i32]) -> Option<f64> {
        grid.flat_index(cell).map(|ix| self.values[ix])
    }

    /// Largest finite value, or 0 when there is none.
    pub fn max_finite(&self) -> f64 {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    }
}

fn strides(shape: &[usize]) -> SmallVec<[usize; INLINE_DIMS]> {
    let mut s: SmallVec<[usize; INLINE_DIMS]> = SmallVec::from_elem(1, shape.len());
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        s[axis] = s[axis + 1] * shape[axis + 1];
    }
    s
}

/// Calls `f` with the flat index of the first element of every 1-D line along `axis`.
fn for_each_line<F: FnMut(usize)>(shape: &[usize], axis: usize, mut f: F) {
    let st = strides(shape);
    let total: usize = shape.iter().product();
    let line_len = shape[axis];
    if line_len == 0 {
        return;
    }
    for base in 0..total {
        if (base / st[axis]) % line_len == 0 {
            f(base);
        }
    }
}

/// One-dimensional squared distance transform of sampled function `f` (lower envelope of parabolas).
fn distance_transform_1d(f: &[f64], d: &mut [f64], v: &mut [usize], z: &mut [f64]) {
    let n = f.len();
    if n == 0 {
        return;
    }
    let mut k = 0usize;
    v[0] = 0;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;
    for q in 1..n {
        let qf = q as f64;
        let mut s;
        loop {
            let p = v[k] as f64;
            s = ((f[q] + qf * qf) - (f[v[k]] + p * p)) / (2.0 * qf - 2.0 * p);
            if s <= z[k] && k > 0 {
                k -= 1;
            } else {
                break;
            }
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }
    k = 0;
    for (q, out) in d.iter_mut().enumerate() {
        let qf = q as f64;
        while z[k + 1] < qf {
            k += 1;
        }
        let p = v[k] as f64;
        *out = (qf - p) * (qf - p) + f[v[k]];
    }
}

/// Euclidean distance from every cell to the nearest obstacle cell centre: 0 on obstacles, infinite
/// everywhere when the grid has no obstacles. Exact, separable over the axes.
pub fn clearance_map(grid: &OccupancyGrid) -> ScalarField {
    let shape = grid.shape();
    if grid.obstacle_count() == 0 {
        return ScalarField {
            shape: SmallVec::from_slice(shape),
            values: vec![f64::INFINITY; grid.len()],
        };
    }
    let mut sq: Vec<f64> = grid
        .cells()
        .iter()
        .map(|&blocked| if blocked { 0.0 } else { FAR })
        .collect();
    let st = strides(shape);
    let max_len = shape.iter().copied().max().unwrap_or(0);
    let mut f = vec![0.0; max_len];
    let mut d = vec![0.0; max_len];
    let mut v = vec![0usize; max_len];
    let mut z = vec![0.0; max_len + 1];
    for axis in 0..shape.len() {
        let n = shape[axis];
        let step = st[axis];
        for_each_line(shape, axis, |base| {
            for i in 0..n {
                f[i] = sq[base + i * step];
            }
            distance_transform_1d(&f[..n], &mut d[..n], &mut v[..n], &mut z[..n + 1]);
            for i in 0..n {
                sq[base + i * step] = d[i];
            }
        });
    }
    let values = sq
        .into_iter()
        .map(|s| if s >= FAR * 0.5 { f64::INFINITY } else { s.sqrt() })
        .collect();
    ScalarField {
        shape: SmallVec::from_slice(shape),
        values,
    }
}

/// Per-axis gradient of a field: central differences in the interior, one-sided differences at the
/// borders and zero along axes of length one. Non-finite values are read as zero.
pub fn gradient(field: &ScalarField) -> Vec<ScalarField> {
    let shape = field.shape();
    let st = strides(shape);
    let value = |ix: usize| {
        let v = field.values[ix];
        if v.is_finite() {
            v
        } else {
            0.0
        }
    };
    (0..shape.len())
        .map(|axis| {
            let mut out = ScalarField::zeros(shape);
            let n = shape[axis];
            let step = st[axis];
            if n < 2 {
                return out;
            }
            for_each_line(shape, axis, |base| {
                for i in 0..n {
                    let ix = base + i * step;
                    out.values[ix] = if i == 0 {
                        value(ix + step) - value(ix)
                    } else if i == n - 1 {
                        value(ix) - value(ix - step)
                    } else {
                        (value(ix + step) - value(ix - step)) / 2.0
                    };
                }
            });
            out
        })
        .collect()
}

/// New grid in which every cell with clearance at most `radius` is an obstacle.
pub fn inflate(grid: &OccupancyGrid, clearance: &ScalarField, radius: f64) -> OccupancyGrid {
    let mut inflated = grid.clone();
    for (ix, &c) in clearance.values().iter().enumerate() {
        if c <= radius {
            inflated.set_index(ix, true);
        }
    }
    inflated
}

/// Mean and standard deviation of the finite clearance over free cells.
pub fn free_clearance_stats(grid: &OccupancyGrid, clearance: &ScalarField) -> Option<(f64, f64)> {
    let values: Vec<f64> = grid
        .cells()
        .iter()
        .zip(clearance.values())
        .filter(|(&blocked, c)| !blocked && c.is_finite())
        .map(|(_, &c)| c)
        .collect();
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

/// Per-cell work of the direct kernel and of the shell sums, in floating point so large radii
/// cannot overflow.
fn potential_costs(radius: usize, ndim: usize) -> (f64, f64) {
    let ndim = ndim as i32;
    let direct = (2.0 * radius as f64 + 1.0).powi(ndim);
    let shells = radius as f64 * 2f64.powi(ndim + 1);
    (direct, shells)
}

/// Obstacle-influence potential: for every cell, the sum over obstacle cells at Chebyshev distance
/// `1..=radius` of `1 / (distance + epsilon)`. Cells beyond the grid contribute nothing. All zeros
/// for a zero radius or an obstacle-free grid.
pub fn obstacle_potential(grid: &OccupancyGrid, radius: usize, epsilon: f64) -> ScalarField {
    if radius == 0 || grid.obstacle_count() == 0 {
        return ScalarField::zeros(grid.shape());
    }
    let (direct_cost, shell_cost) = potential_costs(radius, grid.ndim());
    debug!(
        "Obstacle potential radius {} over {} cells (direct {}, shells {})",
        radius,
        grid.len(),
        direct_cost,
        shell_cost
    );
    if direct_cost <= shell_cost {
        potential_direct(grid, radius, epsilon)
    } else {
        potential_shells(grid, radius, epsilon)
    }
}

/// Convolution with the inverse-Chebyshev kernel, one kernel cell at a time.
pub(crate) fn potential_direct(grid: &OccupancyGrid, radius: usize, epsilon: f64) -> ScalarField {
    let r = radius as i32;
    let kernel: Vec<(SmallVec<[i32; INLINE_DIMS]>, f64)> =
        itertools::Itertools::multi_cartesian_product(itertools::repeat_n(-r..=r, grid.ndim()))
            .filter_map(|o| {
                let d = o.iter().map(|x| x.abs()).max().unwrap_or(0);
                (d > 0).then(|| (SmallVec::from_vec(o), 1.0 / (d as f64 + epsilon)))
            })
            .collect();
    let mut out = ScalarField::zeros(grid.shape());
    for (ix, value) in out.values.iter_mut().enumerate() {
        let cell = grid.unflatten(ix);
        *value = kernel
            .iter()
            .filter(|(o, _)| grid.is_blocked(&cell.offset(o)))
            .map(|(_, w)| w)
            .sum();
    }
    out
}

/// N-D summed-area table with one leading zero per axis.
struct PrefixSums {
    shape: SmallVec<[usize; INLINE_DIMS]>,
    strides: SmallVec<[usize; INLINE_DIMS]>,
    sums: Vec<f64>,
}

impl PrefixSums {
    fn new(grid: &OccupancyGrid) -> PrefixSums {
        let shape: SmallVec<[usize; INLINE_DIMS]> = grid.shape().iter().map(|&n| n + 1).collect();
        let st = strides(&shape);
        let mut sums = vec![0.0; shape.iter().product()];
        for ix in 0..grid.len() {
            if grid.cells()[ix] {
                let cell = grid.unflatten(ix);
                let padded: usize = cell
                    .iter()
                    .zip(&st)
                    .map(|(&c, &s)| (c as usize + 1) * s)
                    .sum();
                sums[padded] = 1.0;
            }
        }
        for axis in 0..shape.len() {
            let n = shape[axis];
            let step = st[axis];
            for_each_line(&shape, axis, |base| {
                for i in 1..n {
                    sums[base + i * step] += sums[base + (i - 1) * step];
                }
            });
        }
        PrefixSums {
            shape,
            strides: st,
            sums,
        }
    }

    /// Obstacle count in the box `[center - r, center + r]` clipped to the grid.
    fn box_sum(&self, center: &Coord, r: i32) -> f64 {
        let ndim = center.ndim();
        let mut lo: SmallVec<[usize; INLINE_DIMS]> = SmallVec::with_capacity(ndim);
        let mut hi: SmallVec<[usize; INLINE_DIMS]> = SmallVec::with_capacity(ndim);
        for (axis, &c) in center.iter().enumerate() {
            let len = self.shape[axis] as i32 - 1;
            let l = (c - r).max(0);
            let h = (c + r).min(len - 1);
            if l > h {
                return 0.0;
            }
            // Padded indices: the sum over [l, h] is P[h + 1] - P[l].
            lo.push(l as usize);
            hi.push(h as usize + 1);
        }
        let mut total = 0.0;
        for mask in 0u32..(1 << ndim) {
            let mut ix = 0;
            let mut lows = 0;
            for axis in 0..ndim {
                if mask & (1 << axis) != 0 {
                    ix += hi[axis] * self.strides[axis];
                } else {
                    ix += lo[axis] * self.strides[axis];
                    lows += 1;
                }
            }
            if lows % 2 == 0 {
                total += self.sums[ix];
            } else {
                total -= self.sums[ix];
            }
        }
        total
    }
}

/// The same potential computed from Chebyshev shells: the obstacle count at exactly distance `d` is
/// the difference of two box sums.
pub(crate) fn potential_shells(grid: &OccupancyGrid, radius: usize, epsilon: f64) -> ScalarField {
    let prefix = PrefixSums::new(grid);
    let mut out = ScalarField::zeros(grid.shape());
    for (ix, value) in out.values.iter_mut().enumerate() {
        let cell = grid.unflatten(ix);
        let mut inner = if grid.cells()[ix] { 1.0 } else { 0.0 };
        let mut acc = 0.0;
        for d in 1..=radius as i32 {
            let outer = prefix.box_sum(&cell, d);
            acc += (outer - inner) / (d as f64 + epsilon);
            inner = outer;
        }
        *value = acc.max(0.0);
    }
    out
}
