use log::{debug, info};

use crate::coord::Coord;
use crate::error::PlanError;
use crate::geometry::{chebyshev, euclidean, manhattan, waypoints_to_path};
use crate::grid::{neighbor_offsets, Connectivity, OccupancyGrid, Offset};
use crate::search::{best_first_search, Edge, GridStore, SearchFailure, SearchProblem};

pub mod astar;
pub mod dijkstra;
pub mod fs_planner;
pub mod inflated_astar;
pub mod optimized_astar;
pub mod rrt;
pub mod safe_astar;
pub mod sdf_astar;
pub mod upp;
pub mod voronoi;

pub const INVALID_START: &str = "Invalid start";
pub const INVALID_GOAL: &str = "Invalid goal";
pub const GOAL_HAS_OBSTACLE: &str = "Goal has obstacle";
pub const START_HAS_OBSTACLE: &str = "Start has obstacle";
pub const START_IS_GOAL: &str = "Start and goal are same";
pub const RECONSTRUCTION_FAILED: &str = "Failed to reconstruct path.";
pub const NO_PATH: &str = "No path found";

/// Outcome of one planning request. Ordinary failures are reported here, with `success` false and
/// the reason in `diagnostics`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanResult {
    pub success: bool,
    /// From start to goal inclusive when `success` is true, empty otherwise.
    pub path: Vec<Coord>,
    pub diagnostics: Vec<String>,
}

impl PlanResult {
    pub fn found(path: Vec<Coord>) -> PlanResult {
        PlanResult {
            success: true,
            path,
            diagnostics: Vec::new(),
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> PlanResult {
        PlanResult {
            success: false,
            path: Vec::new(),
            diagnostics: vec![diagnostic.into()],
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> PlanResult {
        self.diagnostics.push(diagnostic.into());
        self
    }

    /// Cost of the path as the sum of its Euclidean segment lengths.
    pub fn cost(&self) -> f64 {
        crate::geometry::path_cost(&self.path)
    }
}

/// A path planner on occupancy grids. Planners hold only their configuration; everything derived
/// from a request lives for the duration of that call.
pub trait Planner {
    /// The raw waypoints the planner produced. Consecutive waypoints are joined by collision-free
    /// straight segments but need not be adjacent cells.
    fn plan_waypoints(
        &self,
        start: &Coord,
        goal: &Coord,
        grid: &OccupancyGrid,
    ) -> Result<PlanResult, PlanError>;

    /// A path that can be followed cell by cell, made from [plan_waypoints](Self::plan_waypoints).
    fn plan(
        &self,
        start: &Coord,
        goal: &Coord,
        grid: &OccupancyGrid,
    ) -> Result<PlanResult, PlanError> {
        let mut result = self.plan_waypoints(start, goal, grid)?;
        if result.success {
            result.path = waypoints_to_path(std::mem::take(&mut result.path));
        }
        Ok(result)
    }
}

impl<P: Planner + ?Sized> Planner for Box<P> {
    fn plan_waypoints(
        &self,
        start: &Coord,
        goal: &Coord,
        grid: &OccupancyGrid,
    ) -> Result<PlanResult, PlanError> {
        (**self).plan_waypoints(start, goal, grid)
    }

    fn plan(
        &self,
        start: &Coord,
        goal: &Coord,
        grid: &OccupancyGrid,
    ) -> Result<PlanResult, PlanError> {
        (**self).plan(start, goal, grid)
    }
}

/// Checks a request before any planning. A rank mismatch is an error; invalid or blocked endpoints
/// and the trivial start == goal request produce a finished [PlanResult].
pub fn check_request(
    start: &Coord,
    goal: &Coord,
    grid: &OccupancyGrid,
) -> Result<Option<PlanResult>, PlanError> {
    grid.check_rank("start", start)?;
    grid.check_rank("goal", goal)?;
    let early = if !grid.is_valid(start) {
        Some(PlanResult::failed(INVALID_START))
    } else if !grid.is_valid(goal) {
        Some(PlanResult::failed(INVALID_GOAL))
    } else if grid.is_blocked(goal) {
        Some(PlanResult::failed(GOAL_HAS_OBSTACLE))
    } else if grid.is_blocked(start) {
        Some(PlanResult::failed(START_HAS_OBSTACLE))
    } else if start == goal {
        Some(PlanResult::found(vec![start.clone()]).with_diagnostic(START_IS_GOAL))
    } else {
        None
    };
    if let Some(result) = &early {
        debug!("Request {} -> {} settled early: {:?}", start, goal, result.diagnostics);
    }
    Ok(early)
}

/// Distance estimates to the goal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Heuristic {
    Zero,
    #[default]
    Euclidean,
    Manhattan,
    Chebyshev,
}

impl Heuristic {
    pub fn estimate(&self, a: &[i32], b: &[i32]) -> f64 {
        match self {
            Heuristic::Zero => 0.0,
            Heuristic::Euclidean => euclidean(a, b),
            Heuristic::Manhattan => manhattan(a, b),
            Heuristic::Chebyshev => chebyshev(a, b),
        }
    }
}

/// A grid search that moves between free neighbouring cells. `edge_cost` prices a move and
/// `priority` orders the open set given `(node, parent, g)`.
pub struct GridSearch<'a, E, H> {
    grid: &'a OccupancyGrid,
    goal: Coord,
    offsets: Vec<Offset>,
    edge_cost: E,
    priority: H,
}

impl<'a, E, H> GridSearch<'a, E, H>
where
    E: Fn(&Coord, &Coord) -> f64,
    H: FnMut(&Coord, Option<&Coord>, f64) -> f64,
{
    pub fn new(
        grid: &'a OccupancyGrid,
        goal: &Coord,
        connectivity: Connectivity,
        edge_cost: E,
        priority: H,
    ) -> GridSearch<'a, E, H> {
        GridSearch {
            grid,
            goal: goal.clone(),
            offsets: neighbor_offsets(grid.ndim(), connectivity),
            edge_cost,
            priority,
        }
    }
}

impl<'a, E, H> SearchProblem<Coord, f64> for GridSearch<'a, E, H>
where
    E: Fn(&Coord, &Coord) -> f64,
    H: FnMut(&Coord, Option<&Coord>, f64) -> f64,
{
    fn expand(&mut self, node: &Coord, _parent: Option<&Coord>, out: &mut Vec<Edge<Coord, f64>>) {
        for next in self.grid.free_neighbors(node, &self.offsets) {
            let cost = (self.edge_cost)(node, &next);
            out.push(Edge::new(next, cost));
        }
    }

    fn priority(&mut self, node: &Coord, parent: Option<&Coord>, g: f64) -> f64 {
        (self.priority)(node, parent, g)
    }

    fn is_goal(&self, node: &Coord) -> bool {
        *node == self.goal
    }
}

/// Runs a grid search from `start` and turns its outcome into a [PlanResult]. `grid` sizes the
/// search store and must have the shape of the grid the problem moves on.
pub fn run_grid_search<P>(start: &Coord, grid: &OccupancyGrid, problem: &mut P) -> PlanResult
where
    P: SearchProblem<Coord, f64>,
{
    let mut store = GridStore::for_grid(grid);
    match best_first_search(start, problem, &mut store) {
        Ok((path, cost)) => {
            info!("Found path of {} cells with cost {:.3}", path.len(), cost);
            PlanResult::found(path)
        }
        Err(SearchFailure::Exhausted) => PlanResult::failed(NO_PATH),
        Err(SearchFailure::BrokenParents) => PlanResult::failed(RECONSTRUCTION_FAILED),
    }
}

/// Tries `primary` and, if it finds no path, `secondary`. Diagnostics of both attempts are kept.
/// Requests that [check_request] settles are answered once.
pub struct Fallback<A, B> {
    pub primary: A,
    pub secondary: B,
}

impl<A: Planner, B: Planner> Fallback<A, B> {
    pub fn new(primary: A, secondary: B) -> Fallback<A, B> {
        Fallback { primary, secondary }
    }
}

impl<A: Planner, B: Planner> Planner for Fallback<A, B> {
    fn plan_waypoints(
        &self,
        start: &Coord,
        goal: &Coord,
        grid: &OccupancyGrid,
    ) -> Result<PlanResult, PlanError> {
        // A request settled before planning would settle the same way for the secondary.
        if let Some(result) = check_request(start, goal, grid)? {
            return Ok(result);
        }
        let first = self.primary.plan_waypoints(start, goal, grid)?;
        if first.success {
            return Ok(first);
        }
        debug!("Primary planner failed with {:?}, falling back", first.diagnostics);
        let mut second = self.secondary.plan_waypoints(start, goal, grid)?;
        let mut diagnostics = first.diagnostics;
        diagnostics.append(&mut second.diagnostics);
        second.diagnostics = diagnostics;
        Ok(second)
    }
}
