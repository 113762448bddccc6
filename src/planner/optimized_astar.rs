use itertools::Itertools;
use log::debug;

use crate::coord::Coord;
use crate::error::PlanError;
use crate::geometry::{line_of_sight, manhattan, path_cost, turning_angle, EdgeChecker};
use crate::grid::{neighbor_offsets, Connectivity, OccupancyGrid, Offset};
use crate::planner::{check_request, run_grid_search, PlanResult, Planner};
use crate::safety::{clearance_map, ScalarField};
use crate::search::{Edge, SearchProblem};

/// Axis-move A* whose heuristic is scaled by the obstacle density between start and goal and which
/// penalizes turning, followed by a post-pass that pushes waypoints away from obstacles and then
/// shortcuts the path from both ends.
#[derive(Clone, Debug)]
pub struct OptimizedAstar {
    /// Cost per degree of heading change between consecutive moves.
    pub turn_penalty: f64,
    /// Waypoints with clearance at most `safety_radius + 0.5` are relocated.
    pub safety_radius: f64,
    /// Hill-climbing steps allowed per relocated waypoint.
    pub max_inflate_iter: usize,
    /// Samples per shortcut edge check.
    pub point_samples: usize,
}

impl OptimizedAstar {
    pub fn new() -> OptimizedAstar {
        OptimizedAstar {
            turn_penalty: 0.01,
            safety_radius: 1.0,
            max_inflate_iter: 3,
            point_samples: 50,
        }
    }
}

impl Default for OptimizedAstar {
    fn default() -> Self {
        Self::new()
    }
}

/// `ln` of the obstacle fraction in the axis-aligned box spanned by `a` and `b`, clamped away from
/// 0 and 1.
pub fn raster_log_density(grid: &OccupancyGrid, a: &Coord, b: &Coord) -> f64 {
    let ranges = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| x.min(y)..=x.max(y))
        .collect::<Vec<_>>();
    let area: usize = ranges
        .iter()
        .map(|r| (r.end() - r.start() + 1) as usize)
        .product();
    let blocked = ranges
        .into_iter()
        .multi_cartesian_product()
        .filter(|cell| grid.is_blocked(cell))
        .count();
    let p = blocked as f64 / area.max(1) as f64;
    p.clamp(1e-6, 1.0 - 1e-6).ln()
}

struct TurnAwareSearch<'a> {
    grid: &'a OccupancyGrid,
    goal: Coord,
    offsets: Vec<Offset>,
    heuristic_scale: f64,
    turn_penalty: f64,
    /// Parent of the node currently being expanded.
    expanding_parent: Option<Coord>,
}

impl<'a> SearchProblem<Coord, f64> for TurnAwareSearch<'a> {
    fn expand(&mut self, node: &Coord, parent: Option<&Coord>, out: &mut Vec<Edge<Coord, f64>>) {
        self.expanding_parent = parent.cloned();
        out.extend(
            self.grid
                .free_neighbors(node, &self.offsets)
                .map(|next| Edge::new(next, 1.0)),
        );
    }

    fn priority(&mut self, node: &Coord, parent: Option<&Coord>, g: f64) -> f64 {
        let turn = match (&self.expanding_parent, parent) {
            (Some(grandparent), Some(parent)) => turning_angle(grandparent, parent, node).to_degrees(),
            _ => 0.0,
        };
        g + self.heuristic_scale * manhattan(node, &self.goal) + self.turn_penalty * turn
    }

    fn is_goal(&self, node: &Coord) -> bool {
        *node == self.goal
    }
}

impl OptimizedAstar {
    /// Moves interior waypoints that sit too close to obstacles uphill in clearance. A relocated
    /// waypoint is only kept when it stays in line of sight of its neighbours along the path.
    fn safe_inflate(&self, grid: &OccupancyGrid, clearance: &ScalarField, path: &[Coord]) -> Vec<Coord> {
        if path.len() < 3 {
            return path.to_vec();
        }
        let threshold = self.safety_radius + 0.5;
        let offsets = neighbor_offsets(grid.ndim(), Connectivity::Full);
        let clearance_at = |c: &Coord| clearance.get(grid, c).unwrap_or(f64::NEG_INFINITY);
        let mut out = vec![path[0].clone()];
        for i in 1..path.len() - 1 {
            let node = &path[i];
            if clearance_at(node) > threshold {
                out.push(node.clone());
                continue;
            }
            let mut best = node.clone();
            let mut best_clearance = clearance_at(node);
            for _ in 0..self.max_inflate_iter {
                let current = best.clone();
                for next in grid.free_neighbors(&current, &offsets) {
                    let c = clearance_at(&next);
                    if c > best_clearance {
                        best_clearance = c;
                        best = next;
                    }
                }
                if best == current || best_clearance > threshold {
                    break;
                }
            }
            let prev = &out[out.len() - 1];
            if best != *node && line_of_sight(grid, prev, &best) && line_of_sight(grid, &best, &path[i + 1]) {
                out.push(best);
            } else {
                out.push(node.clone());
            }
        }
        out.push(path[path.len() - 1].clone());
        out
    }

    /// Greedy shortcutting: from each kept waypoint jump to the farthest later one with a free edge.
    fn shortcut(&self, grid: &OccupancyGrid, path: &[Coord]) -> Vec<Coord> {
        if path.len() < 3 {
            return path.to_vec();
        }
        let checker = EdgeChecker::new(self.point_samples);
        let mut out = vec![path[0].clone()];
        let mut i = 0;
        while i < path.len() - 1 {
            let j = (i + 1..path.len())
                .rev()
                .find(|&j| checker.is_cell_edge_free(grid, &path[i], &path[j]))
                .unwrap_or(i + 1);
            out.push(path[j].clone());
            i = j;
        }
        out
    }

    /// Shortcuts forwards and backwards and keeps the shorter result.
    fn bidirectional_shortcut(&self, grid: &OccupancyGrid, path: &[Coord]) -> Vec<Coord> {
        let forward = self.shortcut(grid, path);
        let reversed: Vec<Coord> = path.iter().rev().cloned().collect();
        let mut backward = self.shortcut(grid, &reversed);
        backward.reverse();
        if path_cost(&forward) < path_cost(&backward) {
            forward
        } else {
            backward
        }
    }
}

impl Planner for OptimizedAstar {
    fn plan_waypoints(
        &self,
        start: &Coord,
        goal: &Coord,
        grid: &OccupancyGrid,
    ) -> Result<PlanResult, PlanError> {
        if let Some(result) = check_request(start, goal, grid)? {
            return Ok(result);
        }
        let ln_p = raster_log_density(grid, start, goal);
        debug!("Raster log density {:.3}", ln_p);
        let mut problem = TurnAwareSearch {
            grid,
            goal: goal.clone(),
            offsets: neighbor_offsets(grid.ndim(), Connectivity::Axis),
            heuristic_scale: 1.0 - ln_p,
            turn_penalty: self.turn_penalty,
            expanding_parent: None,
        };
        let mut result = run_grid_search(start, grid, &mut problem);
        if result.success {
            let clearance = clearance_map(grid);
            let inflated = self.safe_inflate(grid, &clearance, &result.path);
            result.path = self.bidirectional_shortcut(grid, &inflated);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{is_adjacent, raster_line};

    #[test]
    fn log_density() {
        let grid = OccupancyGrid::from_rows(&[[0u8, 1], [0, 0]]).unwrap();
        let ln_p = raster_log_density(&grid, &Coord::from([0, 0]), &Coord::from([1, 1]));
        assert!((ln_p - 0.25f64.ln()).abs() < 1e-12);
        let empty = OccupancyGrid::new(&[3, 3], false);
        let ln_p = raster_log_density(&empty, &Coord::from([2, 2]), &Coord::from([0, 0]));
        assert!((ln_p - 1e-6f64.ln()).abs() < 1e-12);
    }

    /// Shortcutting an open room leaves only the endpoints.
    #[test]
    fn open_room_is_one_segment() {
        let grid = OccupancyGrid::new(&[8, 8], false);
        let planner = OptimizedAstar::new();
        let result = planner
            .plan_waypoints(&Coord::from([0, 0]), &Coord::from([7, 5]), &grid)
            .unwrap();
        assert!(result.success);
        assert_eq!(result.path, vec![Coord::from([0, 0]), Coord::from([7, 5])]);
    }

    #[test]
    fn waypoints_are_visible_and_dense_path_valid() {
        let mut grid = OccupancyGrid::new(&[12, 12], false);
        for x in 0..9 {
            grid.set(&[x, 4], true);
        }
        for x in 3..12 {
            grid.set(&[x, 8], true);
        }
        let planner = OptimizedAstar::new();
        let (start, goal) = (Coord::from([0, 0]), Coord::from([11, 11]));
        let waypoints = planner.plan_waypoints(&start, &goal, &grid).unwrap();
        assert!(waypoints.success);
        for w in waypoints.path.windows(2) {
            assert!(raster_line(&w[0], &w[1]).iter().all(|c| grid.is_free(c)));
        }
        let dense = planner.plan(&start, &goal, &grid).unwrap();
        assert_eq!(dense.path.first(), Some(&start));
        assert_eq!(dense.path.last(), Some(&goal));
        assert!(dense.path.windows(2).all(|w| is_adjacent(&w[0], &w[1])));
        assert!(dense.path.iter().all(|c| grid.is_free(c)));
    }

    #[test]
    fn inflation_moves_waypoints_away() {
        let mut grid = OccupancyGrid::new(&[7, 7], false);
        grid.set(&[3, 3], true);
        let clearance = clearance_map(&grid);
        let planner = OptimizedAstar::new();
        let path = vec![Coord::from([3, 0]), Coord::from([3, 2]), Coord::from([3, 6])];
        let inflated = planner.safe_inflate(&grid, &clearance, &path);
        assert_eq!(inflated.len(), 3);
        assert!(clearance.get(&grid, &inflated[1]).unwrap() > 1.0);
    }
}
