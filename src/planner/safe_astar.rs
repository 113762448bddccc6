use crate::coord::Coord;
use crate::error::PlanError;
use crate::geometry::{manhattan, step_cost};
use crate::grid::{Connectivity, OccupancyGrid};
use crate::planner::{check_request, run_grid_search, GridSearch, PlanResult, Planner};
use crate::safety::clearance_map;

/// A* whose edges carry a soft clearance penalty:
/// `step_cost + safety_factor / (epsilon + mean clearance of the two cells)`.
#[derive(Clone, Debug)]
pub struct SafeAstar {
    pub safety_factor: f64,
    pub epsilon: f64,
}

impl SafeAstar {
    pub fn new(safety_factor: f64, epsilon: f64) -> SafeAstar {
        SafeAstar {
            safety_factor,
            epsilon,
        }
    }
}

impl Default for SafeAstar {
    fn default() -> Self {
        Self::new(1.0, 0.01)
    }
}

impl Planner for SafeAstar {
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
        let (factor, epsilon) = (self.safety_factor, self.epsilon);
        let mut problem = GridSearch::new(
            grid,
            goal,
            Connectivity::Full,
            |a: &Coord, b: &Coord| {
                let ca = clearance.get(grid, a).unwrap_or(0.0);
                let cb = clearance.get(grid, b).unwrap_or(0.0);
                // Infinite clearance (no obstacles at all) adds nothing.
                step_cost(a, b) + factor / (epsilon + 0.5 * (ca + cb))
            },
            |node: &Coord, _: Option<&Coord>, g: f64| g + manhattan(node, goal),
        );
        Ok(run_grid_search(start, grid, &mut problem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::astar::AstarPlanner;

    fn min_clearance(grid: &OccupancyGrid, path: &[Coord]) -> f64 {
        let clearance = clearance_map(grid);
        path.iter()
            .map(|c| clearance.get(grid, c).unwrap())
            .fold(f64::INFINITY, f64::min)
    }

    /// An open room with a pillar: the penalty pushes the path away from it.
    #[test]
    fn prefers_clearance() {
        let mut grid = OccupancyGrid::new(&[11, 11], false);
        for x in 4..7 {
            for y in 4..7 {
                grid.set(&[x, y], true);
            }
        }
        let (start, goal) = (Coord::from([5, 0]), Coord::from([5, 10]));
        let safe = SafeAstar::new(5.0, 0.01).plan(&start, &goal, &grid).unwrap();
        let plain = AstarPlanner::new().plan(&start, &goal, &grid).unwrap();
        assert!(safe.success && plain.success);
        assert!(min_clearance(&grid, &safe.path) >= min_clearance(&grid, &plain.path));
    }

    #[test]
    fn obstacle_free_grid() {
        let grid = OccupancyGrid::new(&[4, 4, 4], false);
        let result = SafeAstar::default()
            .plan(&Coord::from([0, 0, 0]), &Coord::from([3, 3, 3]), &grid)
            .unwrap();
        assert!(result.success);
        assert_eq!(result.path.len(), 4);
    }
}
