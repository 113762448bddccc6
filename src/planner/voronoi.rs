use log::debug;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::cluster::obstacle_clusters;
use crate::coord::Coord;
use crate::error::PlanError;
use crate::geometry::{euclidean_f64, EdgeChecker};
use crate::grid::OccupancyGrid;
use crate::planner::{check_request, PlanResult, Planner, RECONSTRUCTION_FAILED};
use crate::search::{best_first_search, Edge, SearchFailure, SearchProblem, SparseStore};
use crate::voronoi::voronoi;

pub const TOO_FEW_SITES: &str = "Very less objects to draw vornoi";
pub const ROADMAP_NO_PATH: &str = "Path not found";

/// Roadmap planner over the Voronoi diagram of the obstacle cluster centroids. Paths run along
/// ridges, which keep equal distance to the neighbouring clusters.
#[derive(Clone, Debug)]
pub struct VoronoiPlanner {
    /// Samples per roadmap edge check.
    pub point_samples: usize,
    /// Start and goal are linked to this many of their nearest Voronoi vertices.
    pub knn: usize,
}

impl VoronoiPlanner {
    pub fn new(point_samples: usize, knn: usize) -> VoronoiPlanner {
        VoronoiPlanner { point_samples, knn }
    }
}

impl Default for VoronoiPlanner {
    fn default() -> Self {
        Self::new(50, 3)
    }
}

type Roadmap = UnGraph<Vec<f64>, f64>;

struct RoadmapSearch<'a> {
    graph: &'a Roadmap,
    goal: NodeIndex,
}

impl<'a> SearchProblem<NodeIndex, f64> for RoadmapSearch<'a> {
    fn expand(&mut self, node: &NodeIndex, _parent: Option<&NodeIndex>, out: &mut Vec<Edge<NodeIndex, f64>>) {
        for e in self.graph.edges(*node) {
            let other = if e.source() == *node { e.target() } else { e.source() };
            out.push(Edge::new(other, *e.weight()));
        }
    }

    fn priority(&mut self, node: &NodeIndex, _parent: Option<&NodeIndex>, g: f64) -> f64 {
        g + euclidean_f64(&self.graph[*node], &self.graph[self.goal])
    }

    fn is_goal(&self, node: &NodeIndex) -> bool {
        *node == self.goal
    }
}

impl VoronoiPlanner {
    /// Links `endpoint` to its nearest roadmap vertices where the edge is free.
    fn connect(
        &self,
        graph: &mut Roadmap,
        vertices: &[NodeIndex],
        endpoint: NodeIndex,
        grid: &OccupancyGrid,
        checker: &EdgeChecker,
    ) {
        let here = graph[endpoint].clone();
        let mut nearest: Vec<(f64, NodeIndex)> = vertices
            .iter()
            .map(|&v| (euclidean_f64(&here, &graph[v]), v))
            .collect();
        nearest.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (distance, v) in nearest.into_iter().take(self.knn) {
            if checker.is_edge_free(grid, &here, &graph[v]) {
                graph.add_edge(endpoint, v, distance);
            }
        }
    }
}

impl Planner for VoronoiPlanner {
    fn plan_waypoints(
        &self,
        start: &Coord,
        goal: &Coord,
        grid: &OccupancyGrid,
    ) -> Result<PlanResult, PlanError> {
        if let Some(result) = check_request(start, goal, grid)? {
            return Ok(result);
        }
        let checker = EdgeChecker::new(self.point_samples);
        if checker.is_cell_edge_free(grid, start, goal) {
            return Ok(PlanResult::found(vec![start.clone(), goal.clone()]));
        }
        let sites: Vec<Vec<f64>> = obstacle_clusters(grid)
            .into_iter()
            .map(|c| c.centroid.to_vec())
            .collect();
        if sites.len() <= 4 {
            return Ok(PlanResult::failed(TOO_FEW_SITES));
        }
        let diagram = voronoi(&sites);

        let mut graph = Roadmap::new_undirected();
        let nodes: Vec<Option<NodeIndex>> = diagram
            .vertices
            .iter()
            .map(|v| grid.is_free(&Coord::round_from(v)).then(|| graph.add_node(v.clone())))
            .collect();
        for &(a, b) in &diagram.ridges {
            if let (Some(na), Some(nb)) = (nodes[a], nodes[b]) {
                if checker.is_edge_free(grid, &graph[na], &graph[nb]) {
                    let w = euclidean_f64(&graph[na], &graph[nb]);
                    graph.add_edge(na, nb, w);
                }
            }
        }
        let vertices: Vec<NodeIndex> = nodes.iter().flatten().copied().collect();
        let start_ix = graph.add_node(start.to_f64().to_vec());
        let goal_ix = graph.add_node(goal.to_f64().to_vec());
        self.connect(&mut graph, &vertices, start_ix, grid, &checker);
        self.connect(&mut graph, &vertices, goal_ix, grid, &checker);
        debug!(
            "Roadmap of {} sites: {} nodes, {} edges",
            sites.len(),
            graph.node_count(),
            graph.edge_count()
        );

        let mut problem = RoadmapSearch {
            graph: &graph,
            goal: goal_ix,
        };
        let mut store = SparseStore::new();
        match best_first_search(&start_ix, &mut problem, &mut store) {
            Ok((route, _)) => {
                let mut path: Vec<Coord> = route.iter().map(|&n| Coord::round_from(&graph[n])).collect();
                path.dedup();
                Ok(PlanResult::found(path))
            }
            Err(failure) => Ok(roadmap_failure(failure)),
        }
    }
}

fn roadmap_failure(failure: SearchFailure) -> PlanResult {
    match failure {
        SearchFailure::Exhausted => PlanResult::failed(ROADMAP_NO_PATH),
        SearchFailure::BrokenParents => PlanResult::failed(RECONSTRUCTION_FAILED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::is_adjacent;

    fn dots(grid: &mut OccupancyGrid) {
        for cell in [[3, 3], [3, 16], [16, 3], [16, 16]] {
            grid.set(&cell, true);
        }
    }

    #[test]
    fn failure_diagnostics() {
        assert_eq!(
            roadmap_failure(SearchFailure::Exhausted).diagnostics,
            vec![ROADMAP_NO_PATH.to_string()]
        );
        let broken = roadmap_failure(SearchFailure::BrokenParents);
        assert!(!broken.success);
        assert_eq!(broken.diagnostics, vec![RECONSTRUCTION_FAILED.to_string()]);
    }

    #[test]
    fn straight_line_skips_roadmap() {
        let mut grid = OccupancyGrid::new(&[20, 20], false);
        dots(&mut grid);
        let (start, goal) = (Coord::from([0, 10]), Coord::from([19, 10]));
        let result = VoronoiPlanner::default().plan_waypoints(&start, &goal, &grid).unwrap();
        assert_eq!(result.path, vec![start, goal]);
    }

    #[test]
    fn routes_around_wall() {
        let mut grid = OccupancyGrid::new(&[20, 20], false);
        dots(&mut grid);
        for y in 5..16 {
            grid.set(&[10, y], true);
        }
        let (start, goal) = (Coord::from([0, 10]), Coord::from([19, 10]));
        let planner = VoronoiPlanner::default();
        let result = planner.plan(&start, &goal, &grid).unwrap();
        assert!(result.success, "{:?}", result.diagnostics);
        assert_eq!(result.path.first(), Some(&start));
        assert_eq!(result.path.last(), Some(&goal));
        assert!(result.path.windows(2).all(|w| is_adjacent(&w[0], &w[1])));
        assert!(result.path.iter().all(|c| grid.is_free(c)));
    }

    #[test]
    fn too_few_sites() {
        let mut grid = OccupancyGrid::new(&[10, 10], false);
        for y in 0..9 {
            grid.set(&[5, y], true);
        }
        let result = VoronoiPlanner::default()
            .plan_waypoints(&Coord::from([0, 0]), &Coord::from([9, 0]), &grid)
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.diagnostics, vec![TOO_FEW_SITES.to_string()]);
    }

    #[test]
    fn enclosed_goal() {
        let mut grid = OccupancyGrid::new(&[20, 20], false);
        dots(&mut grid);
        grid.set(&[10, 10], true);
        for cell in [[18, 18], [18, 19], [19, 18]] {
            grid.set(&cell, true);
        }
        let result = VoronoiPlanner::default()
            .plan_waypoints(&Coord::from([0, 0]), &Coord::from([19, 19]), &grid)
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.diagnostics, vec![ROADMAP_NO_PATH.to_string()]);
    }
}
