//! Rapidly-exploring random trees on the grid, optionally filtered by a control barrier function
//! built from the obstacle clusters.
use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;

use crate::cluster::{obstacle_clusters, ObstacleCluster};
use crate::coord::Coord;
use crate::error::PlanError;
use crate::geometry::{euclidean, EdgeChecker};
use crate::grid::OccupancyGrid;
use crate::planner::{check_request, PlanResult, Planner};
use crate::INLINE_DIMS;

type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

pub const ITERATIONS_EXHAUSTED: &str = "Ran out of max iterations couldn't find path";

/// Gains of the second order barrier `b = |x - c|^2 - r^2` around each obstacle cluster.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Barrier {
    pub gamma1: f64,
    pub gamma2: f64,
}

impl Default for Barrier {
    fn default() -> Self {
        Barrier {
            gamma1: 1.0,
            gamma2: 1.0,
        }
    }
}

impl Barrier {
    /// Whether moving to `cell` with velocity `steer` satisfies the barrier condition for at least
    /// one cluster. Always true without clusters.
    pub fn is_safe(&self, clusters: &[ObstacleCluster], cell: &Coord, steer: &[f64]) -> bool {
        if clusters.is_empty() {
            return true;
        }
        let speed_sq: f64 = steer.iter().map(|v| v * v).sum();
        clusters.iter().any(|cluster| {
            let rel: SmallVec<[f64; INLINE_DIMS]> = cell
                .iter()
                .zip(&cluster.centroid)
                .map(|(&x, c)| x as f64 - c)
                .collect();
            let b = rel.iter().map(|d| d * d).sum::<f64>() - cluster.radius * cluster.radius;
            let b_dot = 2.0 * rel.iter().zip(steer).map(|(d, v)| d * v).sum::<f64>();
            let b1 = self.gamma1 * b + b_dot;
            let b1_dot = self.gamma1 * b_dot + 2.0 * speed_sq;
            b1_dot + self.gamma2 * b1 >= 0.0
        })
    }
}

/// Goal-biased RRT. With a [Barrier], candidates that violate it are discarded (CBF-RRT).
///
/// Every call to [plan](Planner::plan) draws from a fresh [StdRng] seeded with `seed`, so results
/// are reproducible; use [plan_with_rng](Rrt::plan_with_rng) to supply another source.
#[derive(Clone, Debug)]
pub struct Rrt {
    pub max_iter: usize,
    /// Probability of sampling the goal instead of a uniform cell.
    pub goal_sample_rate: f64,
    pub step_size: f64,
    /// Samples per edge check.
    pub point_samples: usize,
    pub seed: u64,
    pub barrier: Option<Barrier>,
}

impl Rrt {
    pub fn new(max_iter: usize, goal_sample_rate: f64, step_size: f64, point_samples: usize) -> Rrt {
        Rrt {
            max_iter,
            goal_sample_rate,
            step_size,
            point_samples,
            seed: 0,
            barrier: None,
        }
    }

    pub fn with_barrier(mut self, gamma1: f64, gamma2: f64) -> Rrt {
        self.barrier = Some(Barrier { gamma1, gamma2 });
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Rrt {
        self.seed = seed;
        self
    }

    fn sample<R: Rng + ?Sized>(&self, grid: &OccupancyGrid, goal: &Coord, rng: &mut R) -> Coord {
        if rng.gen::<f64>() < self.goal_sample_rate {
            goal.clone()
        } else {
            grid.shape()
                .iter()
                .map(|&extent| rng.gen_range(0..extent as i32))
                .collect()
        }
    }

    /// Plans with randomness drawn from `rng`.
    pub fn plan_with_rng<R: Rng + ?Sized>(
        &self,
        start: &Coord,
        goal: &Coord,
        grid: &OccupancyGrid,
        rng: &mut R,
    ) -> Result<PlanResult, PlanError> {
        if let Some(result) = check_request(start, goal, grid)? {
            return Ok(result);
        }
        let clusters = match self.barrier {
            Some(_) => obstacle_clusters(grid),
            None => Vec::new(),
        };
        let checker = EdgeChecker::new(self.point_samples);
        let step = self.step_size.min(euclidean(start, goal));
        // Each node maps to the index of its parent; the root has none.
        let mut tree: FxIndexMap<Coord, Option<usize>> = FxIndexMap::default();
        tree.insert(start.clone(), None);

        for _ in 0..self.max_iter {
            let target = self.sample(grid, goal, rng);
            let (nearest_ix, nearest) = match tree
                .keys()
                .enumerate()
                .min_by(|a, b| euclidean(a.1, &target).total_cmp(&euclidean(b.1, &target)))
            {
                Some((ix, node)) => (ix, node.clone()),
                None => break,
            };
            let steer: SmallVec<[f64; INLINE_DIMS]> = nearest
                .iter()
                .zip(target.iter())
                .map(|(a, b)| (b - a) as f64)
                .collect();
            let norm = steer.iter().map(|v| v * v).sum::<f64>().sqrt() + 1e-9;
            let steered: SmallVec<[f64; INLINE_DIMS]> = nearest
                .iter()
                .zip(&steer)
                .map(|(&a, v)| a as f64 + v / norm * step)
                .collect();
            let candidate = Coord::round_from(&steered);
            if candidate == nearest
                || tree.contains_key(&candidate)
                || !grid.is_free(&candidate)
                || !checker.is_cell_edge_free(grid, &nearest, &candidate)
            {
                continue;
            }
            if let Some(barrier) = &self.barrier {
                if !barrier.is_safe(&clusters, &candidate, &steer) {
                    continue;
                }
            }
            let (candidate_ix, _) = tree.insert_full(candidate.clone(), Some(nearest_ix));
            if candidate == *goal {
                return Ok(self.finish(&tree, candidate_ix));
            }
            if euclidean(&candidate, goal) < self.step_size
                && checker.is_cell_edge_free(grid, &candidate, goal)
            {
                let (goal_ix, _) = tree.insert_full(goal.clone(), Some(candidate_ix));
                return Ok(self.finish(&tree, goal_ix));
            }
        }
        debug!("Tree grew to {} nodes without reaching {}", tree.len(), goal);
        Ok(PlanResult::failed(ITERATIONS_EXHAUSTED))
    }

    /// Walks parent indices back from `leaf` to the root.
    fn finish(&self, tree: &FxIndexMap<Coord, Option<usize>>, leaf: usize) -> PlanResult {
        let mut path: Vec<Coord> =
            std::iter::successors(Some(leaf), |&ix| tree.get_index(ix).and_then(|(_, p)| *p))
                .filter_map(|ix| tree.get_index(ix).map(|(node, _)| node.clone()))
                .collect();
        path.reverse();
        info!(
            "Tree of {} nodes reached the goal with {} waypoints",
            tree.len(),
            path.len()
        );
        PlanResult::found(path)
    }
}

impl Default for Rrt {
    fn default() -> Self {
        Rrt::new(5000, 0.1, 3.0, 20)
    }
}

impl Planner for Rrt {
    fn plan_waypoints(
        &self,
        start: &Coord,
        goal: &Coord,
        grid: &OccupancyGrid,
    ) -> Result<PlanResult, PlanError> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.plan_with_rng(start, goal, grid, &mut rng)
    }
}
