use safeplan::planner::astar::AstarPlanner;
use safeplan::{Connectivity, Coord, OccupancyGrid, Planner};

// The same request with and without diagonal moves. Axis-only paths step one axis at a time.
fn main() {
    let mut grid = OccupancyGrid::new(&[10, 10], false);
    for cell in [[1, 1], [1, 2], [2, 1], [2, 2], [5, 0], [6, 0], [0, 5], [0, 6], [8, 8], [9, 9]] {
        grid.set(&cell, true);
    }
    let start = Coord::from([0, 0]);
    let end = Coord::from([7, 7]);
    for connectivity in [Connectivity::Full, Connectivity::Axis] {
        let planner = AstarPlanner {
            connectivity,
            ..AstarPlanner::new()
        };
        let waypoints = planner.plan_waypoints(&start, &end, &grid).unwrap();
        println!("{:?}: {:?}", connectivity, waypoints.path);
    }
}
