use safeplan::planner::fs_planner::FsPlanner;
use safeplan::{waypoints_to_path, Coord, OccupancyGrid, Planner};

/// This example illustrates the two kinds of output a planner gives. `plan_waypoints` returns a
/// minimal representation whose consecutive points may be far apart, which
/// [waypoints_to_path] expands cell by cell. `plan` does the expansion itself.
/// A path is found on a 5x5 grid with shape
/// S
///  #
///
///
///     E
/// where
/// - S marks the start
/// - E marks the end
fn main() {
    let mut grid = OccupancyGrid::new(&[5, 5], false);
    grid.set(&[1, 1], true);
    println!("{}", grid);
    let start = Coord::from([0, 0]);
    let end = Coord::from([4, 4]);
    let planner = FsPlanner::default();
    let waypoints = planner.plan_waypoints(&start, &end, &grid).unwrap();
    println!("Unexpanded path:");
    for p in &waypoints.path {
        println!("{}", p);
    }
    println!("Expanded path:");
    for p in waypoints_to_path(waypoints.path) {
        println!("{}", p);
    }
    let expanded = planner.plan(&start, &end, &grid).unwrap();
    println!("{:?}", expanded.path);
}
