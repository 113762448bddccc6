//! The benchmark lineup: every planner under a display name, with its default configuration.
use crate::planner::astar::AstarPlanner;
use crate::planner::dijkstra::Dijkstra;
use crate::planner::fs_planner::FsPlanner;
use crate::planner::inflated_astar::InflatedAstar;
use crate::planner::optimized_astar::OptimizedAstar;
use crate::planner::rrt::Rrt;
use crate::planner::safe_astar::SafeAstar;
use crate::planner::sdf_astar::SdfAstar;
use crate::planner::upp::Upp;
use crate::planner::voronoi::VoronoiPlanner;
use crate::planner::{Fallback, Planner};

pub type BoxedPlanner = Box<dyn Planner + Send + Sync>;

pub struct NamedPlanner {
    pub name: &'static str,
    pub planner: BoxedPlanner,
}

impl NamedPlanner {
    pub fn new<P: Planner + Send + Sync + 'static>(name: &'static str, planner: P) -> NamedPlanner {
        NamedPlanner {
            name,
            planner: Box::new(planner),
        }
    }
}

/// All planners in benchmark order. Sampling planners use seed 0.
pub fn default_planners() -> Vec<NamedPlanner> {
    vec![
        NamedPlanner::new("Dijkstra", Dijkstra::new()),
        NamedPlanner::new("A*", AstarPlanner::new()),
        NamedPlanner::new("Weighted A*", AstarPlanner::weighted(2.0)),
        NamedPlanner::new("Inflated A*", InflatedAstar::default()),
        NamedPlanner::new("Safe A*", SafeAstar::default()),
        NamedPlanner::new("SDF A*", SdfAstar::default()),
        NamedPlanner::new("Optimized A*", OptimizedAstar::default()),
        NamedPlanner::new("FS-Planner", FsPlanner::default()),
        NamedPlanner::new("RRT", Rrt::default()),
        NamedPlanner::new("CBF-RRT", Rrt::default().with_barrier(1.0, 1.0)),
        NamedPlanner::new("Voronoi", VoronoiPlanner::default()),
        NamedPlanner::new("UPP", Upp::default()),
    ]
}

/// The Voronoi roadmap, falling back to UPP where the roadmap finds nothing.
pub fn voronoi_with_fallback() -> NamedPlanner {
    NamedPlanner::new(
        "Voronoi+UPP",
        Fallback::new(VoronoiPlanner::default(), Upp::default()),
    )
}

/// Looks a planner up by its display name.
pub fn planner_by_name(name: &str) -> Option<NamedPlanner> {
    default_planners()
        .into_iter()
        .chain(std::iter::once(voronoi_with_fallback()))
        .find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Coord;
    use crate::grid::OccupancyGrid;
    use crate::planner::voronoi::TOO_FEW_SITES;

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = default_planners().into_iter().map(|p| p.name).collect();
        names.push(voronoi_with_fallback().name);
        let count = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), count);
        assert!(planner_by_name("UPP").is_some());
        assert!(planner_by_name("JPS").is_none());
    }

    /// Too few obstacle clusters for a roadmap: UPP takes over and both diagnostics are kept.
    #[test]
    fn fallback_takes_over() {
        let mut grid = OccupancyGrid::new(&[10, 10], false);
        for y in 0..9 {
            grid.set(&[5, y], true);
        }
        let named = voronoi_with_fallback();
        let result = named
            .planner
            .plan(&Coord::from([0, 0]), &Coord::from([9, 0]), &grid)
            .unwrap();
        assert!(result.success);
        assert_eq!(result.diagnostics, vec![TOO_FEW_SITES.to_string()]);
    }
}
