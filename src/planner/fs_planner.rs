use fxhash::FxHashSet;
use log::debug;
use smallvec::SmallVec;

use crate::coord::Coord;
use crate::error::PlanError;
use crate::geometry::{euclidean, line_of_sight, EdgeChecker};
use crate::grid::{neighbor_offsets, Connectivity, OccupancyGrid, Offset};
use crate::planner::{check_request, run_grid_search, PlanResult, Planner};
use crate::safety::{clearance_map, ScalarField};
use crate::search::{Edge, SearchProblem};
use crate::INLINE_DIMS;

type Direction = SmallVec<[f64; INLINE_DIMS]>;

/// Any-angle A* over the clearance field.
///
/// Moves cost their length plus `cw / (mean clearance * length + epsilon)`. Each expansion keeps
/// only the `max_neigh` neighbours best aligned with a blend of the goal direction and the
/// direction of steepest clearance gain, and a neighbour is attached straight to the parent of the
/// expanded node when that is shorter and in line of sight (Lazy Theta*).
#[derive(Clone, Debug)]
pub struct FsPlanner {
    /// Samples for the direct start to goal check.
    pub point_samples: usize,
    pub cw: f64,
    pub epsilon: f64,
    pub max_neigh: usize,
}

impl FsPlanner {
    pub fn new(point_samples: usize, cw: f64, epsilon: f64, max_neigh: usize) -> FsPlanner {
        FsPlanner {
            point_samples,
            cw,
            epsilon,
            max_neigh,
        }
    }
}

impl Default for FsPlanner {
    fn default() -> Self {
        Self::new(50, 1.0, 0.01, 5)
    }
}

fn unit(v: impl Iterator<Item = f64>) -> Direction {
    let v: Direction = v.collect();
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt() + 1e-9;
    v.into_iter().map(|x| x / norm).collect()
}

fn direction(from: &Coord, to: &Coord) -> Direction {
    unit(from.iter().zip(to.iter()).map(|(a, b)| (b - a) as f64))
}

/// The `k` candidates whose step from `node` points most along `target`. Ties keep candidate order.
fn aligned_neighbors(node: &Coord, candidates: Vec<Coord>, target: &[f64], k: usize) -> Vec<Coord> {
    let mut scored: Vec<(f64, Coord)> = candidates
        .into_iter()
        .map(|c| {
            let score = direction(node, &c).iter().zip(target).map(|(a, b)| a * b).sum();
            (score, c)
        })
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().take(k).map(|(_, c)| c).collect()
}

struct FieldSearch<'a> {
    grid: &'a OccupancyGrid,
    goal: Coord,
    offsets: Vec<Offset>,
    clearance: ScalarField,
    cw: f64,
    epsilon: f64,
    max_neigh: usize,
    expanded: FxHashSet<Coord>,
}

impl<'a> FieldSearch<'a> {
    fn clearance_at(&self, c: &Coord) -> f64 {
        self.clearance.get(self.grid, c).unwrap_or(0.0)
    }

    fn move_cost(&self, a: &Coord, b: &Coord) -> f64 {
        let len = euclidean(a, b);
        let mean = 0.5 * (self.clearance_at(a) + self.clearance_at(b));
        len + self.cw / (mean * len + self.epsilon)
    }

    /// Unit blend of the goal direction and the direction towards the candidate whose clearance
    /// grows fastest.
    fn steering(&self, node: &Coord, candidates: &[Coord]) -> Direction {
        let here = self.clearance_at(node);
        let safest = candidates
            .iter()
            .map(|c| ((here - self.clearance_at(c)) / (euclidean(node, c) + self.epsilon), c))
            .filter(|(v, _)| !v.is_nan())
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, c)| c);
        let goal_dir = direction(node, &self.goal);
        let sdf_dir = match safest {
            Some(c) => direction(node, c),
            None => goal_dir.iter().map(|_| 0.0).collect(),
        };
        unit(goal_dir.iter().zip(&sdf_dir).map(|(a, b)| a + b))
    }
}

impl<'a> SearchProblem<Coord, f64> for FieldSearch<'a> {
    fn expand(&mut self, node: &Coord, parent: Option<&Coord>, out: &mut Vec<Edge<Coord, f64>>) {
        self.expanded.insert(node.clone());
        let candidates: Vec<Coord> = self
            .grid
            .free_neighbors(node, &self.offsets)
            .filter(|c| !self.expanded.contains(c))
            .collect();
        if candidates.is_empty() {
            return;
        }
        let target = self.steering(node, &candidates);
        for next in aligned_neighbors(node, candidates, &target, self.max_neigh) {
            let edge = match parent {
                Some(p)
                    if euclidean(p, &next) + 1e-9 < euclidean(node, &next)
                        && line_of_sight(self.grid, p, &next) =>
                {
                    Edge::via_parent(next.clone(), self.move_cost(p, &next))
                }
                _ => Edge::new(next.clone(), self.move_cost(node, &next)),
            };
            out.push(edge);
        }
    }

    fn priority(&mut self, node: &Coord, _parent: Option<&Coord>, g: f64) -> f64 {
        g + euclidean(node, &self.goal)
    }

    fn is_goal(&self, node: &Coord) -> bool {
        *node == self.goal
    }
}

impl Planner for FsPlanner {
    fn plan_waypoints(
        &self,
        start: &Coord,
        goal: &Coord,
        grid: &OccupancyGrid,
    ) -> Result<PlanResult, PlanError> {
        if let Some(result) = check_request(start, goal, grid)? {
            return Ok(result);
        }
        if EdgeChecker::new(self.point_samples).is_cell_edge_free(grid, start, goal) {
            debug!("Direct line from {} to {} is free", start, goal);
            return Ok(PlanResult::found(vec![start.clone(), goal.clone()]));
        }
        let mut problem = FieldSearch {
            grid,
            goal: goal.clone(),
            offsets: neighbor_offsets(grid.ndim(), Connectivity::Full),
            clearance: clearance_map(grid),
            cw: self.cw,
            epsilon: self.epsilon,
            max_neigh: self.max_neigh,
            expanded: FxHashSet::default(),
        };
        Ok(run_grid_search(start, grid, &mut problem))
    }
}
