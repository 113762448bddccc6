use smallvec::SmallVec;

use crate::coord::Coord;
use crate::error::PlanError;
use crate::geometry::{manhattan, step_cost};
use crate::grid::{Connectivity, OccupancyGrid};
use crate::planner::{check_request, run_grid_search, GridSearch, PlanResult, Planner};
use crate::safety::{clearance_map, gradient, ScalarField};
use crate::INLINE_DIMS;

/// A* guided by the clearance field: a node's priority is
/// `g * (k1 + s) + (k2 + s) * manhattan(node, goal)`, where `s` is how sharply the clearance changes
/// along the direction of the move that reached the node.
#[derive(Clone, Debug)]
pub struct SdfAstar {
    pub k1: f64,
    pub k2: f64,
}

impl SdfAstar {
    pub fn new(k1: f64, k2: f64) -> SdfAstar {
        SdfAstar { k1, k2 }
    }
}

impl Default for SdfAstar {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

/// Absolute directional derivative of the clearance along `parent -> node`, normalized by the
/// largest gradient component at `node`. Infinite for negative clearance.
fn local_safety(
    grid: &OccupancyGrid,
    clearance: &ScalarField,
    grad: &[ScalarField],
    node: &Coord,
    parent: Option<&Coord>,
) -> f64 {
    let ix = match grid.flat_index(node) {
        Some(ix) => ix,
        None => return f64::INFINITY,
    };
    if clearance.at(ix) < 0.0 {
        return f64::INFINITY;
    }
    let g: SmallVec<[f64; INLINE_DIMS]> = grad.iter().map(|axis| axis.at(ix)).collect();
    let directional = match parent {
        Some(p) => {
            let steer: SmallVec<[f64; INLINE_DIMS]> =
                p.iter().zip(node.iter()).map(|(a, b)| (b - a) as f64).collect();
            let norm = steer.iter().map(|s| s * s).sum::<f64>().sqrt() + 1e-9;
            g.iter().zip(&steer).map(|(gi, si)| gi * si / norm).sum::<f64>()
        }
        None => g.iter().sum::<f64>(),
    };
    let max_derivative = g.iter().fold(0.0f64, |m, v| m.max(v.abs())) + 1e-9;
    directional.abs() / max_derivative
}

impl Planner for SdfAstar {
    fn plan_waypoints(
        &self,
        start: &Coord,
        goal: &Coord,
        grid: &OccupancyGrid,
    ) -> Result<PlanResult, PlanError> {
        if let Some(result) = check_request(start, goal, grid)? {
            return Ok(result);
        }
        let clearance = clearance_map(grid);
        let grad = gradient(&clearance);
        let (k1, k2) = (self.k1, self.k2);
        let mut problem = GridSearch::new(
            grid,
            goal,
            Connectivity::Full,
            |a: &Coord, b: &Coord| step_cost(a, b),
            |node: &Coord, parent: Option<&Coord>, g: f64| {
                let s = local_safety(grid, &clearance, &grad, node, parent);
                g * (k1 + s) + (k2 + s) * manhattan(node, goal)
            },
        );
        Ok(run_grid_search(start, grid, &mut problem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::is_adjacent;

    #[test]
    fn safety_term_bounds() {
        let grid = OccupancyGrid::from_rows(&[[1u8, 0, 0, 0, 0]]).unwrap();
        let clearance = clearance_map(&grid);
        let grad = gradient(&clearance);
        let node = Coord::from([0, 2]);
        // Moving along the gradient: fully aligned.
        let along = local_safety(&grid, &clearance, &grad, &node, Some(&Coord::from([0, 1])));
        assert!((along - 1.0).abs() < 1e-6);
        // A flat field gives zero everywhere.
        let open = OccupancyGrid::new(&[3, 3], false);
        let flat = clearance_map(&open);
        let flat_grad = gradient(&flat);
        assert_eq!(local_safety(&open, &flat, &flat_grad, &Coord::from([1, 1]), None), 0.0);
    }

    #[test]
    fn finds_valid_path() {
        let mut grid = OccupancyGrid::new(&[10, 10], false);
        for x in 0..8 {
            grid.set(&[x, 5], true);
        }
        let result = SdfAstar::default()
            .plan(&Coord::from([0, 0]), &Coord::from([0, 9]), &grid)
            .unwrap();
        assert!(result.success);
        assert!(result.path.windows(2).all(|w| is_adjacent(&w[0], &w[1])));
        assert!(result.path.iter().all(|c| grid.is_free(c)));
    }
}
