use log::debug;

use crate::coord::Coord;
use crate::error::PlanError;
use crate::geometry::{manhattan, step_cost};
use crate::grid::{Connectivity, OccupancyGrid};
use crate::planner::{check_request, run_grid_search, GridSearch, PlanResult, Planner};
use crate::safety::{clearance_map, inflate};

pub const GOAL_INFLATED: &str = "Goal within inflation radius";

/// A* with a Manhattan heuristic on a copy of the grid in which every cell within `radius` of an
/// obstacle is blocked. The start cell may lie inside the inflated region; the search still leaves
/// it, but every later cell keeps the clearance.
#[derive(Clone, Debug)]
pub struct InflatedAstar {
    pub radius: f64,
}

impl InflatedAstar {
    pub fn new(radius: f64) -> InflatedAstar {
        InflatedAstar { radius }
    }
}

impl Default for InflatedAstar {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Planner for InflatedAstar {
    fn plan_waypoints(
        &self,
        start: &Coord,
        goal: &Coord,
        grid: &OccupancyGrid,
    ) -> Result<PlanResult, PlanError> {
        if let Some(result) = check_request(start, goal, grid)? {
            return Ok(result);
        }
        let inflated = inflate(grid, &clearance_map(grid), self.radius);
        debug!(
            "Inflated {} obstacle cells to {}",
            grid.obstacle_count(),
            inflated.obstacle_count()
        );
        if inflated.is_blocked(goal) {
            return Ok(PlanResult::failed(GOAL_INFLATED));
        }
        let mut problem = GridSearch::new(
            &inflated,
            goal,
            Connectivity::Full,
            |a: &Coord, b: &Coord| step_cost(a, b),
            |node: &Coord, _: Option<&Coord>, g: f64| g + manhattan(node, goal),
        );
        Ok(run_grid_search(start, &inflated, &mut problem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::clearance_map;

    #[test]
    fn keeps_clearance() {
        let mut grid = OccupancyGrid::new(&[9, 9], false);
        for y in 0..6 {
            grid.set(&[4, y], true);
        }
        let result = InflatedAstar::new(1.0)
            .plan(&Coord::from([0, 0]), &Coord::from([8, 0]), &grid)
            .unwrap();
        assert!(result.success);
        let clearance = clearance_map(&grid);
        assert!(result.path[1..]
            .iter()
            .all(|c| clearance.get(&grid, c).unwrap() > 1.0));
    }

    #[test]
    fn goal_next_to_obstacle() {
        let mut grid = OccupancyGrid::new(&[5, 5], false);
        grid.set(&[2, 2], true);
        let result = InflatedAstar::new(1.0)
            .plan(&Coord::from([0, 0]), &Coord::from([2, 3]), &grid)
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.diagnostics, vec![GOAL_INFLATED.to_string()]);
    }

    /// A radius wider than the gap closes the only passage.
    #[test]
    fn narrow_passage_closes() {
        let mut grid = OccupancyGrid::new(&[7, 7], false);
        for x in 0..7 {
            if x != 3 {
                grid.set(&[x, 3], true);
            }
        }
        let planner = InflatedAstar::new(1.0);
        let result = planner
            .plan(&Coord::from([3, 0]), &Coord::from([3, 6]), &grid)
            .unwrap();
        assert!(!result.success);
    }
}
