use crate::coord::Coord;
use crate::error::PlanError;
use crate::geometry::step_cost;
use crate::grid::{Connectivity, OccupancyGrid};
use crate::planner::{check_request, run_grid_search, GridSearch, PlanResult, Planner};

/// Uniform-cost search, ordered by the accumulated cost alone.
#[derive(Clone, Debug, Default)]
pub struct Dijkstra {
    pub connectivity: Connectivity,
}

impl Dijkstra {
    pub fn new() -> Dijkstra {
        Dijkstra::default()
    }
}

impl Planner for Dijkstra {
    fn plan_waypoints(
        &self,
        start: &Coord,
        goal: &Coord,
        grid: &OccupancyGrid,
    ) -> Result<PlanResult, PlanError> {
        if let Some(result) = check_request(start, goal, grid)? {
            return Ok(result);
        }
        let mut problem = GridSearch::new(
            grid,
            goal,
            self.connectivity,
            |a: &Coord, b: &Coord| step_cost(a, b),
            |_: &Coord, _: Option<&Coord>, g: f64| g,
        );
        Ok(run_grid_search(start, grid, &mut problem))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::path_cost;
    use crate::planner::astar::AstarPlanner;

    #[test]
    fn matches_astar_cost() {
        let grid = OccupancyGrid::from_rows(&[
            [0u8, 0, 0, 0, 0],
            [0, 1, 1, 1, 0],
            [0, 0, 0, 1, 0],
            [1, 1, 0, 1, 0],
            [0, 0, 0, 0, 0],
        ])
        .unwrap();
        let (start, goal) = (Coord::from([2, 1]), Coord::from([4, 0]));
        let a = Dijkstra::new().plan(&start, &goal, &grid).unwrap();
        let b = AstarPlanner::new().plan(&start, &goal, &grid).unwrap();
        assert!(a.success && b.success);
        assert!((path_cost(&a.path) - path_cost(&b.path)).abs() < 1e-9);
    }

    /// A 3-D grid whose only opening is a single cell in a wall.
    #[test]
    fn three_dimensional_wall() {
        let mut grid = OccupancyGrid::new(&[5, 5, 5], false);
        for y in 0..5 {
            for z in 0..5 {
                if (y, z) != (4, 4) {
                    grid.set(&[2, y, z], true);
                }
            }
        }
        let result = Dijkstra::new()
            .plan(&Coord::from([0, 0, 0]), &Coord::from([4, 0, 0]), &grid)
            .unwrap();
        assert!(result.success);
        assert!(result.path.contains(&Coord::from([2, 4, 4])));
    }
}
