use safeplan::planner::astar::AstarPlanner;
use safeplan::{Coord, OccupancyGrid, Planner};

// In this example a path is found on a grid with shape
// #####
// #S  #
// # # #
// #  E#
// #####
// S marks the start
// E marks the end
fn main() {
    let mut grid = OccupancyGrid::new(&[5, 5], true);
    for x in 1..4 {
        for y in 1..4 {
            grid.set(&[x, y], false);
        }
    }
    grid.set(&[2, 2], true);
    let start = Coord::from([1, 1]);
    let end = Coord::from([3, 3]);
    let result = AstarPlanner::new().plan(&start, &end, &grid).unwrap();
    if result.success {
        println!("A path has been found:");
        for p in result.path {
            println!("{}", p);
        }
    }
}
