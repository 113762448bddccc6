use log::debug;
use smallvec::SmallVec;

use crate::coord::Coord;
use crate::error::PlanError;
use crate::geometry::{angle_between, chebyshev, euclidean, manhattan, step_cost};
use crate::grid::{neighbor_offsets, Connectivity, OccupancyGrid, Offset};
use crate::planner::{check_request, run_grid_search, PlanResult, Planner};
use crate::safety::{clearance_map, free_clearance_stats, obstacle_potential, ScalarField};
use crate::search::{Edge, SearchProblem};
use crate::INLINE_DIMS;

/// Unified path planner: A* over full connectivity with the priority
/// `g + alpha * manhattan + (1 - alpha) * chebyshev + beta * potential(node)`.
///
/// The potential radius and initial `beta` are scaled from the map's obstacle density and
/// clearance statistics. While searching, `beta` grows as long as the search keeps closing in on
/// the goal and shrinks when it stalls or backs off, and `alpha` grows when recent moves turn away
/// from the goal and shrinks when they stay straight.
#[derive(Clone, Debug)]
pub struct Upp {
    pub alpha_base: f64,
    pub alpha_min: f64,
    pub alpha_max: f64,
    pub alpha_decay: f64,
    pub alpha_recovery: f64,
    pub beta_base: f64,
    pub beta_min: f64,
    pub beta_max: f64,
    pub beta_decay: f64,
    pub beta_recovery: f64,
    /// Pops without progress in either direction before `beta` decays.
    pub beta_patience: usize,
    /// Potential radius used when there is no free clearance to measure.
    pub radius_base: usize,
    pub radius_min: usize,
    pub radius_max: usize,
    pub epsilon: f64,
    /// Change in distance to the goal below which a pop counts as a stall.
    pub goal_tol: f64,
    /// Summed turning over a window (radians) above which `alpha` recovers.
    pub tol_angular: f64,
    /// Mean turning per move (radians) below which `alpha` decays.
    pub turn_target: f64,
    pub turn_window: usize,
}

impl Default for Upp {
    fn default() -> Self {
        Upp {
            alpha_base: 0.5,
            alpha_min: 0.05,
            alpha_max: 0.95,
            alpha_decay: 0.97,
            alpha_recovery: 1.05,
            beta_base: 10.0,
            beta_min: 0.1,
            beta_max: 2.0,
            beta_decay: 0.97,
            beta_recovery: 1.05,
            beta_patience: 20,
            radius_base: 30,
            radius_min: 1,
            radius_max: 5,
            epsilon: 0.01,
            goal_tol: 0.1,
            tol_angular: std::f64::consts::PI,
            turn_target: 15f64.to_radians(),
            turn_window: 10,
        }
    }
}

/// Weights a search starts from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tuning {
    pub alpha: f64,
    pub beta: f64,
    pub radius: usize,
}

impl Upp {
    /// Initial weights and potential radius for `grid`.
    pub fn rescale(&self, grid: &OccupancyGrid) -> Tuning {
        let rho = grid.obstacle_density();
        let clearance = clearance_map(grid);
        let (radius, spread) = match free_clearance_stats(grid, &clearance) {
            Some((mu, sigma)) => (
                ((mu + sigma).round().max(0.0) as usize).clamp(self.radius_min, self.radius_max),
                sigma / (mu + self.epsilon),
            ),
            None => (self.radius_base.clamp(self.radius_min, self.radius_max), 0.0),
        };
        Tuning {
            alpha: self.alpha_base.clamp(self.alpha_min, self.alpha_max),
            beta: (self.beta_base * rho * (1.0 + spread)).clamp(self.beta_min, self.beta_max),
            radius,
        }
    }
}

struct AdaptiveSearch<'a> {
    config: &'a Upp,
    grid: &'a OccupancyGrid,
    goal: Coord,
    offsets: Vec<Offset>,
    potential: ScalarField,
    alpha: f64,
    beta: f64,
    last_distance: Option<f64>,
    stalled: usize,
    turn_sum: f64,
    turn_samples: usize,
}

impl<'a> AdaptiveSearch<'a> {
    fn adapt_beta(&mut self, node: &Coord) {
        let c = self.config;
        let distance = euclidean(node, &self.goal);
        if let Some(last) = self.last_distance.replace(distance) {
            let progress = last - distance;
            if progress > c.goal_tol {
                self.beta = (self.beta * c.beta_recovery).min(c.beta_max);
                self.stalled = 0;
            } else if progress < -c.goal_tol {
                self.beta = (self.beta * c.beta_decay).max(c.beta_min);
                self.stalled = 0;
            } else {
                self.stalled += 1;
                if self.stalled >= c.beta_patience {
                    self.beta = (self.beta * c.beta_decay).max(c.beta_min);
                    self.stalled = 0;
                }
            }
        }
    }

    fn adapt_alpha(&mut self, node: &Coord, parent: &Coord) {
        let c = self.config;
        let step: SmallVec<[f64; INLINE_DIMS]> =
            parent.iter().zip(node.iter()).map(|(a, b)| (b - a) as f64).collect();
        let to_goal: SmallVec<[f64; INLINE_DIMS]> = parent
            .iter()
            .zip(self.goal.iter())
            .map(|(a, b)| (b - a) as f64)
            .collect();
        self.turn_sum += angle_between(&step, &to_goal);
        self.turn_samples += 1;
        if self.turn_samples < c.turn_window {
            return;
        }
        if self.turn_sum > c.tol_angular {
            self.alpha = (self.alpha * c.alpha_recovery).clamp(c.alpha_min, c.alpha_max);
        } else if self.turn_sum / (self.turn_samples as f64) < c.turn_target {
            self.alpha = (self.alpha * c.alpha_decay).clamp(c.alpha_min, c.alpha_max);
        }
        self.turn_sum = 0.0;
        self.turn_samples = 0;
    }
}

impl<'a> SearchProblem<Coord, f64> for AdaptiveSearch<'a> {
    fn expand(&mut self, node: &Coord, parent: Option<&Coord>, out: &mut Vec<Edge<Coord, f64>>) {
        self.adapt_beta(node);
        if let Some(parent) = parent {
            self.adapt_alpha(node, parent);
        }
        out.extend(
            self.grid
                .free_neighbors(node, &self.offsets)
                .map(|next| {
                    let cost = step_cost(node, &next);
                    Edge::new(next, cost)
                }),
        );
    }

    fn priority(&mut self, node: &Coord, _parent: Option<&Coord>, g: f64) -> f64 {
        let safety = self.potential.get(self.grid, node).unwrap_or(0.0);
        g + self.alpha * manhattan(node, &self.goal)
            + (1.0 - self.alpha) * chebyshev(node, &self.goal)
            + self.beta * safety
    }

    fn is_goal(&self, node: &Coord) -> bool {
        *node == self.goal
    }
}

impl Planner for Upp {
    fn plan_waypoints(
        &self,
        start: &Coord,
        goal: &Coord,
        grid: &OccupancyGrid,
    ) -> Result<PlanResult, PlanError> {
        if let Some(result) = check_request(start, goal, grid)? {
            return Ok(result);
        }
        let tuning = self.rescale(grid);
        debug!("UPP starts from {:?}", tuning);
        let mut problem = AdaptiveSearch {
            config: self,
            grid,
            goal: goal.clone(),
            offsets: neighbor_offsets(grid.ndim(), Connectivity::Full),
            potential: obstacle_potential(grid, tuning.radius, self.epsilon),
            alpha: tuning.alpha,
            beta: tuning.beta,
            last_distance: None,
            stalled: 0,
            turn_sum: 0.0,
            turn_samples: 0,
        };
        let result = run_grid_search(start, grid, &mut problem);
        debug!("UPP ended with alpha {:.3}, beta {:.3}", problem.alpha, problem.beta);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::is_adjacent;

    #[test]
    fn rescale_open_grid() {
        let grid = OccupancyGrid::new(&[6, 6], false);
        let upp = Upp::default();
        let tuning = upp.rescale(&grid);
        assert_eq!(tuning.radius, 5);
        assert_eq!(tuning.beta, upp.beta_min);
        assert_eq!(tuning.alpha, 0.5);
    }

    #[test]
    fn rescale_cluttered_grid() {
        let grid = OccupancyGrid::from_rows(&[
            [1u8, 0, 1, 0],
            [0, 0, 0, 0],
            [1, 0, 1, 0],
            [0, 0, 0, 0],
        ])
        .unwrap();
        let tuning = Upp::default().rescale(&grid);
        // Free clearance is mostly 1, so the radius is small and the dense map saturates beta.
        assert!(tuning.radius >= 1 && tuning.radius <= 2);
        assert_eq!(tuning.beta, 2.0);
    }

    #[test]
    fn beta_tracks_progress() {
        let grid = OccupancyGrid::new(&[10, 10], false);
        let upp = Upp::default();
        let mut search = AdaptiveSearch {
            config: &upp,
            grid: &grid,
            goal: Coord::from([9, 0]),
            offsets: neighbor_offsets(2, Connectivity::Full),
            potential: ScalarField::zeros(grid.shape()),
            alpha: 0.5,
            beta: 1.0,
            last_distance: None,
            stalled: 0,
            turn_sum: 0.0,
            turn_samples: 0,
        };
        search.adapt_beta(&Coord::from([0, 0]));
        assert_eq!(search.beta, 1.0);
        search.adapt_beta(&Coord::from([1, 0]));
        assert!((search.beta - 1.05).abs() < 1e-12);
        search.adapt_beta(&Coord::from([0, 0]));
        assert!((search.beta - 1.05 * 0.97).abs() < 1e-12);
        let before = search.beta;
        for _ in 0..upp.beta_patience {
            search.adapt_beta(&Coord::from([0, 0]));
        }
        assert!((search.beta - before * 0.97).abs() < 1e-12);
        assert_eq!(search.stalled, 0);
    }

    #[test]
    fn alpha_reacts_to_turning() {
        let grid = OccupancyGrid::new(&[10, 10], false);
        let upp = Upp::default();
        let mut search = AdaptiveSearch {
            config: &upp,
            grid: &grid,
            goal: Coord::from([9, 0]),
            offsets: neighbor_offsets(2, Connectivity::Full),
            potential: ScalarField::zeros(grid.shape()),
            alpha: 0.5,
            beta: 1.0,
            last_distance: None,
            stalled: 0,
            turn_sum: 0.0,
            turn_samples: 0,
        };
        // Straight at the goal: alpha decays once per window.
        for _ in 0..upp.turn_window {
            search.adapt_alpha(&Coord::from([1, 0]), &Coord::from([0, 0]));
        }
        assert!((search.alpha - 0.5 * 0.97).abs() < 1e-12);
        // Perpendicular moves add up to more than the tolerance.
        let before = search.alpha;
        for _ in 0..upp.turn_window {
            search.adapt_alpha(&Coord::from([0, 1]), &Coord::from([0, 0]));
        }
        assert!((search.alpha - before * 1.05).abs() < 1e-12);
    }

    #[test]
    fn finds_valid_path() {
        let mut grid = OccupancyGrid::new(&[15, 15], false);
        for x in 2..13 {
            grid.set(&[x, 7], true);
        }
        let (start, goal) = (Coord::from([7, 0]), Coord::from([7, 14]));
        let result = Upp::default().plan(&start, &goal, &grid).unwrap();
        assert!(result.success);
        assert_eq!(result.path.first(), Some(&start));
        assert_eq!(result.path.last(), Some(&goal));
        assert!(result.path.windows(2).all(|w| is_adjacent(&w[0], &w[1])));
        assert!(result.path.iter().all(|c| grid.is_free(c)));
    }
}
