use crate::coord::Coord;
use crate::error::PlanError;
use crate::geometry::step_cost;
use crate::grid::{Connectivity, OccupancyGrid};
use crate::planner::{check_request, run_grid_search, GridSearch, Heuristic, PlanResult, Planner};

/// A* over free neighbouring cells with priority `g + heuristic_factor * h`. With the default
/// Euclidean heuristic and a factor of one the returned paths are optimal.
#[derive(Clone, Debug)]
pub struct AstarPlanner {
    pub heuristic: Heuristic,
    pub heuristic_factor: f64,
    pub connectivity: Connectivity,
}

impl AstarPlanner {
    pub fn new() -> AstarPlanner {
        AstarPlanner {
            heuristic: Heuristic::Euclidean,
            heuristic_factor: 1.0,
            connectivity: Connectivity::Full,
        }
    }

    /// Weighted A*: the Manhattan distance scaled by `weight`. Weights above one trade optimality
    /// for fewer expansions. With diagonal moves Manhattan overestimates, so even a weight of one
    /// is inadmissible.
    pub fn weighted(weight: f64) -> AstarPlanner {
        AstarPlanner {
            heuristic: Heuristic::Manhattan,
            heuristic_factor: weight,
            connectivity: Connectivity::Full,
        }
    }
}

impl Default for AstarPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner for AstarPlanner {
    fn plan_waypoints(
        &self,
        start: &Coord,
        goal: &Coord,
        grid: &OccupancyGrid,
    ) -> Result<PlanResult, PlanError> {
        if let Some(result) = check_request(start, goal, grid)? {
            return Ok(result);
        }
        let (heuristic, factor) = (self.heuristic, self.heuristic_factor);
        let mut problem = GridSearch::new(
            grid,
            goal,
            self.connectivity,
            |a: &Coord, b: &Coord| step_cost(a, b),
            |node: &Coord, _: Option<&Coord>, g: f64| g + factor * heuristic.estimate(node, goal),
        );
        Ok(run_grid_search(start, grid, &mut problem))
    }
}
