//! Distances, segment rasterization and collision checks shared by the planners.
use smallvec::SmallVec;

use crate::coord::Coord;
use crate::grid::OccupancyGrid;
use crate::INLINE_DIMS;

pub fn euclidean(a: &[i32], b: &[i32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = (x - y) as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

pub fn euclidean_f64(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

pub fn manhattan(a: &[i32], b: &[i32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum::<i32>() as f64
}

pub fn chebyshev(a: &[i32], b: &[i32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .max()
        .unwrap_or(0) as f64
}

/// Cost of moving between two cells: 1.0 for a unit axis step, the Euclidean length of the offset
/// otherwise.
pub fn step_cost(a: &[i32], b: &[i32]) -> f64 {
    let mut sum_sq = 0;
    for (x, y) in a.iter().zip(b) {
        let d = x - y;
        sum_sq += d * d;
    }
    if sum_sq == 1 {
        1.0
    } else {
        (sum_sq as f64).sqrt()
    }
}

/// Angle in radians between the moves `a -> b` and `b -> c`. Zero when either move is empty.
pub fn turning_angle(a: &[i32], b: &[i32], c: &[i32]) -> f64 {
    let u: SmallVec<[f64; INLINE_DIMS]> = a.iter().zip(b).map(|(x, y)| (y - x) as f64).collect();
    let v: SmallVec<[f64; INLINE_DIMS]> = b.iter().zip(c).map(|(x, y)| (y - x) as f64).collect();
    angle_between(&u, &v)
}

/// Angle in radians between two vectors. Zero when either is the zero vector.
pub fn angle_between(u: &[f64], v: &[f64]) -> f64 {
    let nu = u.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nv = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if nu == 0.0 || nv == 0.0 {
        return 0.0;
    }
    let dot: f64 = u.iter().zip(v).map(|(x, y)| x * y).sum();
    (dot / (nu * nv)).clamp(-1.0, 1.0).acos()
}

/// The cells of the segment `a -> b`, one per Chebyshev step, each rounded from the linear
/// interpolation. Consecutive cells are always adjacent and both endpoints are included. The same
/// cells are visited in either direction.
pub fn raster_line(a: &Coord, b: &Coord) -> Vec<Coord> {
    if b.as_slice() < a.as_slice() {
        let mut line = raster_line(b, a);
        line.reverse();
        return line;
    }
    let steps = chebyshev(a, b) as i32;
    if steps == 0 {
        return vec![a.clone()];
    }
    let delta = a.delta_to(b);
    (0..=steps)
        .map(|k| {
            let t = k as f64 / steps as f64;
            a.iter()
                .zip(&delta)
                .map(|(&start, &d)| start + (d as f64 * t).round() as i32)
                .collect()
        })
        .collect()
}

/// True when every cell of [raster_line] between `a` and `b` is inside the grid and free.
pub fn line_of_sight(grid: &OccupancyGrid, a: &Coord, b: &Coord) -> bool {
    raster_line(a, b).iter().all(|c| grid.is_free(c))
}

/// Checks straight edges between continuous positions by sampling them.
#[derive(Clone, Copy, Debug)]
pub struct EdgeChecker {
    /// Number of evenly spaced samples along the segment, endpoints included.
    pub point_samples: usize,
}

impl EdgeChecker {
    pub fn new(point_samples: usize) -> EdgeChecker {
        EdgeChecker { point_samples }
    }

    /// Samples the segment `a -> b`, rounding each sample to a cell and rejecting the edge on the
    /// first sample that is out of bounds or occupied. The cells visited by densifying the edge
    /// between the rounded endpoints are checked as well, so an accepted edge can always be
    /// followed cell by cell.
    pub fn is_edge_free(&self, grid: &OccupancyGrid, a: &[f64], b: &[f64]) -> bool {
        let samples = self.point_samples.max(2);
        let sampled_free = (0..samples).all(|k| {
            let t = k as f64 / (samples - 1) as f64;
            let p: SmallVec<[f64; INLINE_DIMS]> =
                a.iter().zip(b).map(|(x, y)| x + (y - x) * t).collect();
            grid.is_free(&Coord::round_from(&p))
        });
        sampled_free && line_of_sight(grid, &Coord::round_from(a), &Coord::round_from(b))
    }

    pub fn is_cell_edge_free(&self, grid: &OccupancyGrid, a: &Coord, b: &Coord) -> bool {
        self.is_edge_free(grid, &a.to_f64(), &b.to_f64())
    }
}

/// Turns waypoints into a path on the grid which can be followed step by step. Due to symmetry this
/// is typically one of many ways to follow the waypoints.
pub fn waypoints_to_path(waypoints: Vec<Coord>) -> Vec<Coord> {
    let mut iter = waypoints.into_iter();
    let mut current = match iter.next() {
        Some(first) => first,
        None => return Vec::new(),
    };
    let mut path = vec![current.clone()];
    for next in iter {
        if next == current {
            continue;
        }
        path.extend(raster_line(&current, &next).into_iter().skip(1));
        current = next;
    }
    path
}

/// Sum of the Euclidean lengths of consecutive segments.
pub fn path_cost(path: &[Coord]) -> f64 {
    path.windows(2).map(|w| euclidean(&w[0], &w[1])).sum()
}

/// True when consecutive cells differ by at most one along every axis and are not equal.
pub fn is_adjacent(a: &[i32], b: &[i32]) -> bool {
    a.len() == b.len() && a != b && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances() {
        assert_eq!(manhattan(&[0, 0], &[3, -4]), 7.0);
        assert_eq!(chebyshev(&[0, 0], &[3, -4]), 4.0);
        assert_eq!(euclidean(&[0, 0], &[3, -4]), 5.0);
        assert_eq!(step_cost(&[0, 0, 0], &[0, 1, 0]), 1.0);
        assert!((step_cost(&[0, 0, 0], &[1, 1, 1]) - 3f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn raster_line_is_adjacent() {
        let a = Coord::from([0, 0, 0]);
        let b = Coord::from([5, -2, 3]);
        let line = raster_line(&a, &b);
        assert_eq!(line.len(), 6);
        assert_eq!(line.first(), Some(&a));
        assert_eq!(line.last(), Some(&b));
        assert!(line.windows(2).all(|w| is_adjacent(&w[0], &w[1])));
    }

    #[test]
    fn raster_line_is_symmetric() {
        let a = Coord::from([0, 0]);
        let b = Coord::from([3, 1]);
        let mut back = raster_line(&b, &a);
        back.reverse();
        assert_eq!(raster_line(&a, &b), back);
    }

    #[test]
    fn densify_waypoints() {
        let path = waypoints_to_path(vec![
            Coord::from([0, 0]),
            Coord::from([0, 3]),
            Coord::from([0, 3]),
            Coord::from([2, 1]),
        ]);
        assert_eq!(path.len(), 6);
        assert!(path.windows(2).all(|w| is_adjacent(&w[0], &w[1])));
        assert!((path_cost(&path) - (3.0 + 2.0 * 2f64.sqrt())).abs() < 1e-9);
        assert!(waypoints_to_path(Vec::new()).is_empty());
    }

    /// Two samples only look at the endpoints; the blocked middle cell is still caught.
    #[test]
    fn edge_checker_matches_raster() {
        let grid = OccupancyGrid::from_rows(&[[0u8, 0, 0, 0], [0, 1, 0, 0], [0, 0, 0, 0]]).unwrap();
        let checker = EdgeChecker::new(2);
        assert!(!checker.is_cell_edge_free(&grid, &Coord::from([0, 0]), &Coord::from([2, 2])));
        assert!(checker.is_cell_edge_free(&grid, &Coord::from([0, 0]), &Coord::from([0, 3])));
        assert!(!checker.is_edge_free(&grid, &[0.0, 0.0], &[0.0, 9.0]));
    }

    #[test]
    fn angles() {
        assert_eq!(turning_angle(&[0, 0], &[0, 1], &[0, 2]), 0.0);
        assert!((turning_angle(&[0, 0], &[0, 1], &[1, 1]) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert_eq!(turning_angle(&[0, 0], &[0, 0], &[1, 1]), 0.0);
    }
}
