//! # safeplan
//!
//! Path planners on N-dimensional occupancy grids, built for comparing how short and how safe their
//! paths are. Included are uniform-cost search,
//! [A*](https://en.wikipedia.org/wiki/A*_search_algorithm) and its weighted, inflated and
//! clearance-aware variants, an any-angle planner using
//! [Lazy Theta*](https://en.wikipedia.org/wiki/Theta*) connections,
//! [RRT](https://en.wikipedia.org/wiki/Rapidly_exploring_random_tree) with and without a control
//! barrier function, a roadmap over the
//! [Voronoi diagram](https://en.wikipedia.org/wiki/Voronoi_diagram) of obstacle clusters and an
//! adaptive planner blending distance and obstacle potential.
//!
//! All grid planners share one best-first search ([search::best_first_search]) and implement
//! [Planner], which produces either raw waypoints or a path that can be followed cell by cell.
//!
//! ```
//! use safeplan::{Coord, OccupancyGrid, Planner};
//! use safeplan::planner::astar::AstarPlanner;
//!
//! let mut grid = OccupancyGrid::new(&[5, 5], false);
//! grid.set(&[2, 1], true);
//! let result = AstarPlanner::new()
//!     .plan(&Coord::from([0, 0]), &Coord::from([4, 4]), &grid)
//!     .unwrap();
//! assert!(result.success);
//! assert_eq!(result.path.len(), 5);
//! ```
pub mod cluster;
pub mod coord;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod planner;
pub mod registry;
pub mod safety;
pub mod search;
pub mod voronoi;

/// Coordinates and small per-axis buffers of up to this many dimensions are stored inline.
pub const INLINE_DIMS: usize = 4;

pub use crate::coord::Coord;
pub use crate::error::PlanError;
pub use crate::geometry::{path_cost, waypoints_to_path};
pub use crate::grid::{Connectivity, OccupancyGrid};
pub use crate::planner::{Fallback, Heuristic, PlanResult, Planner};
pub use crate::registry::{default_planners, NamedPlanner};
